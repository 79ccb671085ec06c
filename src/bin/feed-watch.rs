//! Console dashboard: subscribe to the readings feed and log the rolling series and alerts.

use std::sync::Arc;

use fleetwatch::channel::{ChannelConfig, ChannelState, HttpTransport, TelemetryChannel};
use fleetwatch::config::WatchConfig;
use fleetwatch::dashboard::LiveSeries;
use fleetwatch::models::TemperatureReading;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WatchConfig::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let transport = HttpTransport::new(config.connect_timeout)?;
    let channel = TelemetryChannel::new(Arc::new(transport));
    let mut updates = channel.watch();

    let handle = channel.open(
        ChannelConfig::new(config.feed_url.clone(), config.active)
            .with_event_kind(config.event_kind.clone()),
    );
    if handle.connection().is_none() {
        info!(active = config.active, feed_url = %config.feed_url, "feed disabled, nothing to watch");
        return Ok(());
    }

    let mut series = LiveSeries::new(config.max_points);
    let mut seen_seq = 0;
    let mut last_error = None;

    let outcome = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snapshot = updates.borrow_and_update().clone();

                if snapshot.payload_seq != seen_seq {
                    seen_seq = snapshot.payload_seq;
                    match snapshot.payload_as::<TemperatureReading>() {
                        Some(Ok(reading)) => {
                            let time = reading.time.clone();
                            let device_id = reading.device_id.clone();
                            let alert = series.push(reading);
                            info!(
                                time = %time,
                                device_id = device_id.as_deref().unwrap_or("N/A"),
                                latest = %series.latest_temperature(),
                                points = series.len(),
                                "reading"
                            );
                            if let Some(alert) = alert {
                                warn!(kind = ?alert.kind, title = %alert.title, time = %alert.time, "{}", alert.message);
                            }
                        }
                        Some(Err(e)) => warn!(error = %e, "payload is not a temperature reading"),
                        None => {}
                    }
                }

                if snapshot.error != last_error {
                    if let Some(error) = &snapshot.error {
                        warn!(error = %error, state = ?snapshot.state, "feed error");
                    }
                    last_error = snapshot.error.clone();
                }

                if snapshot.state == ChannelState::Failed {
                    break Err(anyhow::anyhow!(
                        "feed connection lost: {}",
                        last_error.map(|e| e.to_string()).unwrap_or_default()
                    ));
                }
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    channel.close();
    if let Some(stats) = series.stats() {
        info!(
            points = series.len(),
            min = stats.min,
            max = stats.max,
            average = stats.average,
            alerts = series.alerts().count(),
            "session summary"
        );
    }
    outcome
}
