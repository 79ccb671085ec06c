//! HTTP handlers: ingestion of readings and notifications, and health.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Local;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::error::AppError;
use crate::models::{clock_time, DeviceNotification, PublishReceipt, SensorData, Topic};
use crate::services::FeedService;

/// Shared application state for HTTP and SSE handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Key devices send in `x-app-key` to publish.
    pub app_key: String,
    pub feed: FeedService,
}

impl AppState {
    pub fn new(app_key: impl Into<String>, feed: FeedService) -> Self {
        Self {
            app_key: app_key.into(),
            feed,
        }
    }

    pub fn feed(&self) -> &FeedService {
        &self.feed
    }
}

/// POST /api/sensor-data — publish a device temperature reading on the realtime feed.
/// Other reading types are rejected with 400. Requires header: x-app-key: <app_key>.
pub async fn ingest_sensor_data(
    State(state): State<AppState>,
    Json(body): Json<SensorData>,
) -> Result<Json<PublishReceipt>, AppError> {
    body.validate()?;
    body.ensure_temperature()?;
    let reading = body.to_reading(Local::now().naive_local());
    let count = state.feed().publish_reading(&reading)?;
    info!(
        device_id = %body.device_id,
        kind = %body.kind,
        value = body.value,
        count,
        "sensor data published"
    );

    Ok(Json(PublishReceipt {
        ok: true,
        topic: Topic::Readings,
        subscriber_count: count,
        data: serde_json::to_value(&reading)?,
    }))
}

/// POST /api/notifications — publish a device notification.
/// Requires header: x-app-key: <app_key>.
pub async fn publish_notification(
    State(state): State<AppState>,
    Json(mut body): Json<DeviceNotification>,
) -> Result<Json<PublishReceipt>, AppError> {
    body.validate()?;
    if body.timestamp.trim().is_empty() {
        body.timestamp = clock_time(Local::now().time());
    }
    let count = state.feed().publish_notification(&body)?;
    info!(device_id = %body.device_id, kind = ?body.kind, count, "notification published");

    Ok(Json(PublishReceipt {
        ok: true,
        topic: Topic::Notifications,
        subscriber_count: count,
        data: serde_json::to_value(&body)?,
    }))
}

/// GET /health — liveness probe.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "fleetwatch",
            "subscribers": {
                "readings": state.feed().subscriber_count(Topic::Readings),
                "notifications": state.feed().subscriber_count(Topic::Notifications),
            }
        })),
    )
}
