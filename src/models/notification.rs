//! Device notifications pushed on the `notification` event stream.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Severity shown by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Alert,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeviceNotification {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[validate(length(min = 1, max = 64))]
    pub device_id: String,
    /// `HH:MM:SS`; filled in on ingestion when empty.
    #[serde(default)]
    pub timestamp: String,
}
