//! Simulated device traffic for demos and development: temperature readings and notifications.

use std::time::Duration;

use chrono::{Local, NaiveTime};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::models::{clock_time, DeviceNotification, NotificationKind, TemperatureReading};
use crate::services::FeedService;

const MIN_TEMPERATURE: f64 = 20.0;
const TEMPERATURE_SPAN: f64 = 8.0;

/// Reading in `[20.0, 28.0]` °C with one decimal, from a random `temp-sensor-NNN`.
pub fn simulated_reading<R: Rng>(rng: &mut R, time: NaiveTime) -> TemperatureReading {
    let raw = MIN_TEMPERATURE + rng.gen::<f64>() * TEMPERATURE_SPAN;
    let value = (raw * 10.0).round() / 10.0;
    let device_id = format!("temp-sensor-{:03}", rng.gen_range(0..100));
    TemperatureReading::new(time, value, device_id)
}

/// One of three notification templates for a random `device-NNN`.
pub fn simulated_notification<R: Rng>(rng: &mut R, time: NaiveTime) -> DeviceNotification {
    let device_id = format!("device-{:03}", rng.gen_range(0..100));
    let (title, message, kind) = match rng.gen_range(0..3) {
        0 => (
            "Device offline",
            format!("Device {} lost its connection.", device_id),
            NotificationKind::Alert,
        ),
        1 => (
            "Low battery",
            format!("Drone {} is below 20% battery.", device_id),
            NotificationKind::Alert,
        ),
        _ => (
            "Sensor status update",
            format!("Sensor {} sent a new reading.", device_id),
            NotificationKind::Info,
        ),
    };
    DeviceNotification {
        title: title.to_string(),
        message,
        kind,
        device_id,
        timestamp: clock_time(time),
    }
}

/// Start both generators. Abort the returned handles to stop them.
pub fn spawn_simulators(
    feed: FeedService,
    reading_every: Duration,
    notification_every: Duration,
) -> Vec<JoinHandle<()>> {
    info!(
        reading_ms = reading_every.as_millis() as u64,
        notification_ms = notification_every.as_millis() as u64,
        "starting simulators"
    );
    vec![
        tokio::spawn(run_readings(feed.clone(), reading_every)),
        tokio::spawn(run_notifications(feed, notification_every)),
    ]
}

async fn run_readings(feed: FeedService, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First emission after one full period.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let reading = simulated_reading(&mut rand::thread_rng(), Local::now().time());
        if let Err(e) = feed.publish_reading(&reading) {
            warn!(error = %e, "failed to publish simulated reading");
        }
    }
}

async fn run_notifications(feed: FeedService, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let notification = simulated_notification(&mut rand::thread_rng(), Local::now().time());
        if let Err(e) = feed.publish_notification(&notification) {
            warn!(error = %e, "failed to publish simulated notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Topic;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn readings_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let reading = simulated_reading(&mut rng, noon());
            assert!((20.0..=28.0).contains(&reading.value), "{}", reading.value);
            let one_decimal: f64 = format!("{:.1}", reading.value).parse().unwrap();
            assert_eq!(one_decimal, reading.value);
            let device = reading.device_id.unwrap();
            assert!(device.starts_with("temp-sensor-"));
            assert_eq!(device.len(), "temp-sensor-".len() + 3);
            assert_eq!(reading.time, "12:00:00");
        }
    }

    #[test]
    fn notifications_cover_all_templates() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut titles = std::collections::HashSet::new();
        for _ in 0..200 {
            let n = simulated_notification(&mut rng, noon());
            assert!(n.message.contains(&n.device_id));
            let expected = if n.title == "Sensor status update" {
                NotificationKind::Info
            } else {
                NotificationKind::Alert
            };
            assert_eq!(n.kind, expected);
            titles.insert(n.title);
        }
        assert_eq!(titles.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn simulators_publish_on_schedule() {
        let feed = FeedService::new(16);
        let mut readings = feed.subscribe(Topic::Readings);
        let mut notifications = feed.subscribe(Topic::Notifications);
        let handles = spawn_simulators(
            feed,
            Duration::from_secs(2),
            Duration::from_secs(5),
        );

        let payload = readings.recv().await.unwrap();
        let reading: TemperatureReading = serde_json::from_str(&payload).unwrap();
        assert!((20.0..=28.0).contains(&reading.value));
        let payload = notifications.recv().await.unwrap();
        let n: DeviceNotification = serde_json::from_str(&payload).unwrap();
        assert!(!n.timestamp.is_empty());

        for handle in handles {
            handle.abort();
        }
    }
}
