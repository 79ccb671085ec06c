//! `text/event-stream` framing: split the response body into frames and decode frame payloads.

use std::time::Duration;

use serde_json::Value;

use crate::error::ChannelError;
use crate::models::DEFAULT_EVENT_KIND;

/// Some servers write the SSE field prefix into the data itself, so it shows up twice on the wire.
pub const DATA_PREFIX: &str = "data: ";

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Longest line the decoder buffers while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One dispatched frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event kind (`event:` field), `message` when the server named none.
    pub kind: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
    /// Last event id seen on the stream when this frame was dispatched.
    pub id: Option<String>,
}

impl SseEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self::named(DEFAULT_EVENT_KIND, data)
    }

    pub fn named(kind: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
            id: None,
        }
    }
}

/// Incremental event-stream parser. Chunks may split lines, CRLF pairs and UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    line: Vec<u8>,
    after_cr: bool,
    first_line_done: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
    retry: Option<u64>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the body; returns every frame completed by it, in order.
    ///
    /// Fails once a line grows past [`MAX_LINE_BYTES`] without a terminator.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, ChannelError> {
        let mut out = Vec::new();
        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut out),
                b'\r' => {
                    self.after_cr = true;
                    self.end_line(&mut out);
                }
                _ => {
                    if self.line.len() >= MAX_LINE_BYTES {
                        self.line.clear();
                        return Err(ChannelError::Transport(format!(
                            "line exceeds {} bytes without a terminator",
                            MAX_LINE_BYTES
                        )));
                    }
                    self.line.push(byte);
                }
            }
        }
        Ok(out)
    }

    /// Reconnection delay the server asked for. Recorded only; the channel never retries by itself.
    pub fn retry_hint(&self) -> Option<Duration> {
        self.retry.map(Duration::from_millis)
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    fn end_line(&mut self, out: &mut Vec<SseEvent>) {
        if !self.first_line_done {
            self.first_line_done = true;
            if self.line.starts_with(BOM) {
                self.line.drain(..BOM.len());
            }
        }
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                out.push(event);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(i) => {
                let value = &line[i + 1..];
                (&line[..i], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line.as_str(), ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = (!value.is_empty()).then(|| value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry = value.parse().ok();
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let kind = self
            .event
            .take()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT_KIND.to_string());
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            kind,
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
        })
    }
}

/// Decode a frame payload: trim, drop a doubled `data: ` prefix, parse JSON.
pub fn decode_payload(raw: &str) -> Result<Value, ChannelError> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix(DATA_PREFIX) {
        text = rest.trim();
    }
    serde_json::from_str(text).map_err(|e| ChannelError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn decodes_plain_payload() {
        let value = assert_ok!(decode_payload(r#"{"time":"10:00:00","value":22}"#));
        assert_eq!(value, json!({"time": "10:00:00", "value": 22}));
    }

    #[test]
    fn strips_doubled_prefix_and_whitespace() {
        let value = assert_ok!(decode_payload("  data: {\"time\":\"10:00:00\",\"value\":22}\n"));
        assert_eq!(value, json!({"time": "10:00:00", "value": 22}));
    }

    #[test]
    fn malformed_payload_is_decode_error() {
        let err = assert_err!(decode_payload("data: {not json"));
        assert!(matches!(err, ChannelError::Decode(_)));
    }

    #[test]
    fn single_message_frame() {
        let mut decoder = FrameDecoder::new();
        let events = assert_ok!(decoder.feed(b"data: {\"time\":\"10:00:00\",\"value\":22}\n\n"));
        assert_eq!(events, vec![SseEvent::message(r#"{"time":"10:00:00","value":22}"#)]);
    }

    #[test]
    fn doubled_framing_round_trips_through_decode() {
        let mut decoder = FrameDecoder::new();
        let events = assert_ok!(decoder.feed(b"data:data: {\"value\":1}\n\n"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "data: {\"value\":1}");
        assert_eq!(assert_ok!(decode_payload(&events[0].data)), json!({"value": 1}));
    }

    #[test]
    fn named_event_and_reset() {
        let mut decoder = FrameDecoder::new();
        let events = assert_ok!(decoder.feed(b"event: notification\ndata: {}\n\ndata: {}\n\n"));
        assert_eq!(events[0].kind, "notification");
        assert_eq!(events[1].kind, "message");
    }

    #[test]
    fn chunks_split_anywhere() {
        let wire = "event: notification\r\ndata: {\"title\":\"Batería\"}\r\n\r\n".as_bytes();
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for byte in wire {
            events.extend(assert_ok!(decoder.feed(std::slice::from_ref(byte))));
        }
        assert_eq!(events, vec![SseEvent::named("notification", "{\"title\":\"Batería\"}")]);
    }

    #[test]
    fn bare_cr_line_endings() {
        let mut decoder = FrameDecoder::new();
        let events = assert_ok!(decoder.feed(b"data: a\rdata: b\r\r"));
        assert_eq!(events, vec![SseEvent::message("a\nb")]);
    }

    #[test]
    fn comments_and_unknown_fields_ignored() {
        let mut decoder = FrameDecoder::new();
        let events = assert_ok!(decoder.feed(b": keep-alive\n\nfoo: bar\ndata\n\n"));
        assert_eq!(events, vec![SseEvent::message("")]);
    }

    #[test]
    fn event_without_data_is_not_dispatched() {
        let mut decoder = FrameDecoder::new();
        assert!(assert_ok!(decoder.feed(b"event: notification\n\n")).is_empty());
        let events = assert_ok!(decoder.feed(b"data: x\n\n"));
        assert_eq!(events[0].kind, "message");
    }

    #[test]
    fn id_and_retry_fields() {
        let mut decoder = FrameDecoder::new();
        let events = assert_ok!(decoder.feed(b"id: 7\nretry: 1500\ndata: x\n\nretry: soon\n\n"));
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(decoder.last_event_id(), Some("7"));
        assert_eq!(decoder.retry_hint(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn leading_bom_skipped() {
        let mut decoder = FrameDecoder::new();
        let events = assert_ok!(decoder.feed(b"\xEF\xBB\xBFdata: x\n\n"));
        assert_eq!(events, vec![SseEvent::message("x")]);
    }

    #[test]
    fn incomplete_frame_is_held() {
        let mut decoder = FrameDecoder::new();
        assert!(assert_ok!(decoder.feed(b"data: {\"va")).is_empty());
        let events = assert_ok!(decoder.feed(b"lue\":3}\n\n"));
        assert_eq!(events, vec![SseEvent::message("{\"value\":3}")]);
    }

    #[test]
    fn unterminated_line_is_capped() {
        let mut decoder = FrameDecoder::new();
        let chunk = vec![b'x'; 64 * 1024];
        let mut fed = 0;
        let err = loop {
            match decoder.feed(&chunk) {
                Ok(events) => assert!(events.is_empty()),
                Err(e) => break e,
            }
            fed += chunk.len();
            assert!(fed <= MAX_LINE_BYTES, "decoder kept buffering past the cap");
        };
        assert!(err.is_connection_failure());
        assert!(err.to_string().contains("without a terminator"), "{}", err);
    }

    #[test]
    fn line_at_cap_still_decodes() {
        let mut decoder = FrameDecoder::new();
        let mut wire = b"data: ".to_vec();
        wire.resize(MAX_LINE_BYTES, b'a');
        wire.extend_from_slice(b"\n\n");
        let events = assert_ok!(decoder.feed(&wire));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.len(), MAX_LINE_BYTES - "data: ".len());
    }
}
