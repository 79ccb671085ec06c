//! Live telemetry feed for IoT device and drone fleets.
//!
//! Server side: SSE endpoints for temperature readings and device notifications, fed by
//! ingestion endpoints and optional simulators. Client side: [`TelemetryChannel`], which keeps
//! one server-push subscription alive and exposes the latest decoded record and error.

pub mod channel;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use channel::{ChannelConfig, ChannelHandle, ChannelState, HttpTransport, TelemetryChannel};
pub use config::{Config, WatchConfig};
pub use error::{AppError, ChannelError};
pub use handlers::http::AppState;
pub use services::FeedService;

use axum::routing::{get, post};
use handlers::http;
use tower_http::trace::TraceLayer;

/// Build the API router (SSE streams, publishing, health). Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let publish_routes = axum::Router::new()
        .route("/api/sensor-data", post(http::ingest_sensor_data))
        .route("/api/notifications", post(http::publish_notification))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_app_key,
        ));

    let sse_routes = axum::Router::new()
        .route("/api/sse/realtime-data", get(handlers::realtime_data))
        .route("/api/sse/notifications", get(handlers::notifications));

    axum::Router::new()
        .route("/health", get(http::health))
        .merge(sse_routes)
        .merge(publish_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
