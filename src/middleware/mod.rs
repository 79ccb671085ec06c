//! Middleware: app-key check on the publishing API.

pub mod auth;

pub use auth::{require_app_key, HEADER_APP_KEY};
