//! Feed topics and the receipt returned by the publish API.

use serde::{Deserialize, Serialize};

/// Event kind a subscriber gets when the server does not name one.
pub const DEFAULT_EVENT_KIND: &str = "message";

/// Logical stream on the feed. Each topic has its own SSE endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Temperature readings, sent as unnamed (`message`) events.
    Readings,
    /// Device notifications, sent as `notification` events.
    Notifications,
}

impl Topic {
    /// SSE `event:` name; `None` means the default `message` kind.
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            Topic::Readings => None,
            Topic::Notifications => Some("notification"),
        }
    }

    /// Event kind a subscriber must listen for to receive this topic.
    pub fn event_kind(&self) -> &'static str {
        self.event_name().unwrap_or(DEFAULT_EVENT_KIND)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Readings => "readings",
            Topic::Notifications => "notifications",
        }
    }
}

/// Response body of the ingestion endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub ok: bool,
    pub topic: Topic,
    pub subscriber_count: usize,
    pub data: serde_json::Value,
}
