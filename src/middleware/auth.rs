//! App-key middleware for the publishing routes. SSE streams stay open to any allowed origin.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::AppError;
use crate::handlers::http::AppState;

pub const HEADER_APP_KEY: &str = "x-app-key";

/// Middleware: require a matching `x-app-key` header.
pub async fn require_app_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = request
        .headers()
        .get(HEADER_APP_KEY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !key_matches(&state.app_key, key) {
        debug!(path = %request.uri().path(), "rejected request: invalid or missing x-app-key");
        return Err(AppError::Auth("invalid or missing x-app-key".to_string()));
    }

    Ok(next.run(request).await)
}

fn key_matches(expected: &str, presented: &str) -> bool {
    !presented.is_empty() && presented == expected
}

#[cfg(test)]
mod tests {
    use super::key_matches;

    #[test]
    fn key_matching() {
        assert!(key_matches("secret", "secret"));
        assert!(!key_matches("secret", "Secret"));
        assert!(!key_matches("secret", ""));
        assert!(!key_matches("", ""));
    }
}
