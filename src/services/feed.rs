//! Feed hub: one broadcast channel per topic, fan-out to every SSE subscriber.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::AppResult;
use crate::models::{DeviceNotification, TemperatureReading, Topic};

/// Distributes serialized records to the subscribers of each topic.
#[derive(Clone, Debug)]
pub struct FeedService {
    readings: broadcast::Sender<String>,
    notifications: broadcast::Sender<String>,
}

impl FeedService {
    /// `capacity` records are buffered per topic; a subscriber further behind skips ahead.
    pub fn new(capacity: usize) -> Self {
        let (readings, _) = broadcast::channel(capacity);
        let (notifications, _) = broadcast::channel(capacity);
        Self {
            readings,
            notifications,
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<String> {
        match topic {
            Topic::Readings => &self.readings,
            Topic::Notifications => &self.notifications,
        }
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<String> {
        self.sender(topic).subscribe()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }

    /// Publish a record as JSON. Returns how many subscribers it reached; zero is not an error.
    pub fn publish<T: Serialize>(&self, topic: Topic, record: &T) -> AppResult<usize> {
        let payload = serde_json::to_string(record)?;
        let count = self.sender(topic).send(payload).unwrap_or(0);
        debug!(topic = topic.as_str(), count, "published");
        Ok(count)
    }

    pub fn publish_reading(&self, reading: &TemperatureReading) -> AppResult<usize> {
        self.publish(Topic::Readings, reading)
    }

    pub fn publish_notification(&self, notification: &DeviceNotification) -> AppResult<usize> {
        self.publish(Topic::Notifications, notification)
    }
}
