//! SSE handlers: one event stream per feed topic.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::handlers::http::AppState;
use crate::models::Topic;

/// GET /api/sse/realtime-data — temperature readings as default `message` events.
pub async fn realtime_data(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(topic_stream(&state, Topic::Readings)).keep_alive(KeepAlive::default())
}

/// GET /api/sse/notifications — device notifications as `notification` events.
pub async fn notifications(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(topic_stream(&state, Topic::Notifications)).keep_alive(KeepAlive::default())
}

/// Logs the subscriber leaving when the response stream is dropped.
struct Subscriber {
    id: Uuid,
    topic: Topic,
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        info!(subscriber = %self.id, topic = self.topic.as_str(), "sse disconnected");
    }
}

fn topic_stream(
    state: &AppState,
    topic: Topic,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let subscriber = Subscriber {
        id: Uuid::new_v4(),
        topic,
    };
    info!(subscriber = %subscriber.id, topic = topic.as_str(), "sse connected");
    let rx = state.feed().subscribe(topic);

    stream::unfold((rx, subscriber), |(mut rx, subscriber)| async move {
        let payload = next_payload(&mut rx, &subscriber).await?;
        let mut event = Event::default().data(payload);
        if let Some(name) = subscriber.topic.event_name() {
            event = event.event(name);
        }
        Some((Ok(event), (rx, subscriber)))
    })
}

async fn next_payload(
    rx: &mut broadcast::Receiver<String>,
    subscriber: &Subscriber,
) -> Option<String> {
    loop {
        match rx.recv().await {
            Ok(payload) => return Some(payload),
            Err(RecvError::Lagged(skipped)) => {
                warn!(subscriber = %subscriber.id, skipped, "sse subscriber lagging, records skipped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
