//! Configuration loaded from environment for the feed server and the feed watcher.

use std::net::SocketAddr;
use std::time::Duration;

/// Feed server configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g. `0.0.0.0:8080`).
    pub server_addr: SocketAddr,
    /// Key devices must send in `x-app-key` to publish readings and notifications.
    pub app_key: String,
    /// Origin allowed to open the SSE streams from a browser (e.g. `http://localhost:3000`).
    pub allowed_origin: String,
    /// Run the built-in reading / notification generators.
    pub simulate: bool,
    pub reading_interval: Duration,
    pub notification_interval: Duration,
    /// Records buffered per topic before slow subscribers start skipping.
    pub feed_capacity: usize,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let server_addr = std::env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let server_addr: SocketAddr = server_addr
            .parse()
            .map_err(|_| ConfigLoadError::InvalidServerAddr)?;

        let app_key = std::env::var("APP_KEY").unwrap_or_else(|_| "fleetwatch_key".to_string());
        let allowed_origin = std::env::var("ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let simulate = env_flag("SIMULATE", true)?;
        let reading_interval = env_millis("READING_INTERVAL_MS", 2_000)?;
        let notification_interval = env_millis("NOTIFICATION_INTERVAL_MS", 5_000)?;
        let feed_capacity = env_number("FEED_CAPACITY", 64)?;
        if feed_capacity == 0 {
            return Err(ConfigLoadError::InvalidNumber("FEED_CAPACITY"));
        }
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            server_addr,
            app_key,
            allowed_origin,
            simulate,
            reading_interval,
            notification_interval,
            feed_capacity: feed_capacity as usize,
            log_level,
        })
    }
}

/// Configuration of the `feed-watch` console dashboard.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// SSE endpoint; empty leaves the channel disabled.
    pub feed_url: String,
    /// Event kind to listen for (`message` for readings).
    pub event_kind: String,
    /// Whether the watcher should connect at all (stands in for "user is signed in").
    pub active: bool,
    pub connect_timeout: Duration,
    /// Cap on retained points; `None` keeps everything.
    pub max_points: Option<usize>,
    pub log_level: String,
}

impl WatchConfig {
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let feed_url = std::env::var("FEED_URL")
            .unwrap_or_else(|_| "http://localhost:8080/api/sse/realtime-data".to_string());
        let event_kind = std::env::var("FEED_EVENT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| crate::models::DEFAULT_EVENT_KIND.to_string());
        let active = env_flag("FEED_ACTIVE", true)?;
        let connect_timeout = Duration::from_secs(env_number("FEED_CONNECT_TIMEOUT_SECS", 10)?);
        let max_points = match env_number("FEED_MAX_POINTS", 0)? {
            0 => None,
            n => Some(n as usize),
        };
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            feed_url,
            event_kind,
            active,
            connect_timeout,
            max_points,
            log_level,
        })
    }
}

fn env_number(name: &'static str, default: u64) -> Result<u64, ConfigLoadError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigLoadError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

fn env_millis(name: &'static str, default: u64) -> Result<Duration, ConfigLoadError> {
    let ms = env_number(name, default)?;
    if ms == 0 {
        return Err(ConfigLoadError::InvalidNumber(name));
    }
    Ok(Duration::from_millis(ms))
}

fn env_flag(name: &'static str, default: bool) -> Result<bool, ConfigLoadError> {
    match std::env::var(name) {
        Ok(raw) => parse_flag(&raw).ok_or(ConfigLoadError::InvalidFlag(name)),
        Err(_) => Ok(default),
    }
}

/// Parse `true/false`, `1/0`, `yes/no`, `on/off` (case-insensitive).
pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid SERVER_ADDR")]
    InvalidServerAddr,
    #[error("Invalid number in {0}")]
    InvalidNumber(&'static str),
    #[error("Invalid boolean in {0}")]
    InvalidFlag(&'static str),
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn parse_flag_values() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" ON "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("No"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
