//! Application error types for the feed server and the subscription channel.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Feed server errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Serialization(e) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid payload: {}", e),
            ),
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, format!("Invalid payload: {}", e)),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced through a subscription channel's `latest_error`.
///
/// A disabled channel (inactive or no endpoint) is not an error and never produces one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The connection could not even be attempted (e.g. malformed endpoint).
    #[error("could not start SSE connection: {0}")]
    Start(String),

    /// The connection failed or was closed by the server.
    #[error("SSE connection error: {0}")]
    Transport(String),

    /// A frame arrived whose payload is not JSON after un-framing.
    #[error("error processing SSE data: {0}")]
    Decode(String),
}

impl ChannelError {
    /// True for failures that tore the connection down.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ChannelError::Start(_) | ChannelError::Transport(_))
    }
}
