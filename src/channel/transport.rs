//! Transport seam between a subscription channel and the network.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Url;
use tracing::debug;

use crate::channel::frame::{FrameDecoder, SseEvent};
use crate::error::ChannelError;

/// Frames of one live connection. Ends when the server closes the stream.
pub type EventStream = BoxStream<'static, Result<SseEvent, ChannelError>>;

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Opens server-push connections. The returned stream owns the connection; dropping it closes it.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn connect(&self, endpoint: &str) -> Result<EventStream, ChannelError>;
}

/// HTTP event-stream transport over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ChannelError::Start(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self, endpoint: &str) -> Result<EventStream, ChannelError> {
        let url = Url::parse(endpoint.trim())
            .map_err(|e| ChannelError::Start(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, EVENT_STREAM_MIME)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Transport(format!("unexpected status {}", status)));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !is_event_stream(content_type) {
            return Err(ChannelError::Transport(format!(
                "unexpected content type '{}'",
                content_type
            )));
        }
        debug!(endpoint = %endpoint, "event stream opened");

        let mut decoder = FrameDecoder::new();
        let events = response
            .bytes_stream()
            .map(move |chunk| {
                let batch: Vec<Result<SseEvent, ChannelError>> = match chunk {
                    Ok(bytes) => match decoder.feed(&bytes) {
                        Ok(events) => events.into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(e)],
                    },
                    Err(e) => vec![Err(ChannelError::Transport(e.to_string()))],
                };
                stream::iter(batch)
            })
            .flatten()
            .boxed();
        Ok(events)
    }
}

fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case(EVENT_STREAM_MIME))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_check() {
        assert!(is_event_stream("text/event-stream"));
        assert!(is_event_stream("Text/Event-Stream; charset=utf-8"));
        assert!(!is_event_stream("application/json"));
        assert!(!is_event_stream(""));
    }

    #[tokio::test]
    async fn malformed_endpoint_is_start_error() {
        let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
        let err = transport.connect("not a url").await.err().unwrap();
        assert!(matches!(err, ChannelError::Start(_)));
    }
}
