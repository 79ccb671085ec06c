//! Live telemetry subscription channel.
//!
//! A [`TelemetryChannel`] supervises at most one server-push connection at a time and exposes
//! the latest decoded payload and the latest error. Every [`TelemetryChannel::open`] closes the
//! previous connection before starting the next one; updates coming from a connection that is
//! no longer the live one are dropped.
//!
//! ```text
//!            open(enabled)              connected
//! Disabled ───────────────► Connecting ───────────► Connected
//!    ▲  ▲                        │                      │
//!    │  └──── close / open(disabled) ◄──────────────────┤
//!    │                           │ transport failure    │
//!    │                           ▼                      │
//!    └──── open(disabled) ──── Failed ◄─────────────────┘
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::channel::frame::decode_payload;
use crate::channel::transport::Transport;
use crate::error::ChannelError;
use crate::models::DEFAULT_EVENT_KIND;

/// What to subscribe to. The owner computes `active` (e.g. "a user is signed in").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub endpoint: String,
    pub active: bool,
    pub event_kind: String,
}

impl ChannelConfig {
    pub fn new(endpoint: impl Into<String>, active: bool) -> Self {
        Self {
            endpoint: endpoint.into(),
            active,
            event_kind: DEFAULT_EVENT_KIND.to_string(),
        }
    }

    pub fn with_event_kind(mut self, event_kind: impl Into<String>) -> Self {
        self.event_kind = event_kind.into();
        self
    }

    /// A channel connects only when active and pointed at an endpoint.
    pub fn is_enabled(&self) -> bool {
        self.active && !self.endpoint.trim().is_empty()
    }
}

/// Identity of one opened connection; increases with every `open` on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No connection, and none wanted.
    #[default]
    Disabled,
    Connecting,
    Connected,
    /// The last connection failed; waits for a new `open`.
    Failed,
}

/// Observable outputs of a channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelSnapshot {
    pub state: ChannelState,
    pub payload: Option<Value>,
    pub error: Option<ChannelError>,
    /// Bumped on every accepted payload, so consumers can tell new records from error-only updates.
    pub payload_seq: u64,
    pub connection: Option<ConnectionId>,
}

impl ChannelSnapshot {
    /// Deserialize the latest payload into a domain record.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.payload.clone().map(serde_json::from_value)
    }
}

#[derive(Debug)]
struct Live {
    id: ConnectionId,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Inner {
    config: Option<ChannelConfig>,
    live: Option<Live>,
    next_id: u64,
}

impl Inner {
    fn is_live(&self, id: ConnectionId) -> bool {
        self.live.as_ref().map(|l| l.id) == Some(id)
    }

    fn next_connection_id(&mut self) -> ConnectionId {
        self.next_id += 1;
        ConnectionId(self.next_id)
    }

    /// Abort the live connection task, if any. Publishing the new state is up to the caller.
    fn abort_live(&mut self) -> Option<ConnectionId> {
        let live = self.live.take()?;
        live.task.abort();
        Some(live.id)
    }
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    snapshot: watch::Sender<ChannelSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply an update coming from connection `id`. Returns false (and changes nothing) when
    /// `id` is no longer the live connection.
    fn apply(&self, id: ConnectionId, update: impl FnOnce(&mut ChannelSnapshot)) -> bool {
        let inner = self.lock();
        if !inner.is_live(id) {
            trace!(connection = %id, "dropping update from stale connection");
            return false;
        }
        self.snapshot.send_modify(update);
        true
    }

    /// Connection `id` failed: forget it and record the error.
    fn fail(&self, id: ConnectionId, error: ChannelError) -> bool {
        let mut inner = self.lock();
        if !inner.is_live(id) {
            return false;
        }
        // Called from the connection's own task, which returns right after.
        inner.live = None;
        self.snapshot.send_modify(|s| {
            s.state = ChannelState::Failed;
            s.error = Some(error);
            s.connection = None;
        });
        true
    }

    /// Close the live connection, or only `only` when given.
    fn close(&self, only: Option<ConnectionId>) -> Option<ConnectionId> {
        let mut inner = self.lock();
        if let Some(id) = only {
            if !inner.is_live(id) {
                return None;
            }
        }
        let closed = inner.abort_live()?;
        self.snapshot.send_modify(|s| {
            s.state = ChannelState::Disabled;
            s.connection = None;
        });
        Some(closed)
    }
}

/// Handle to one `open`. Closing it only affects that connection, and only while it is live.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: Option<ConnectionId>,
    shared: Weak<Shared>,
}

impl ChannelHandle {
    fn detached() -> Self {
        Self {
            id: None,
            shared: Weak::new(),
        }
    }

    /// The connection this handle refers to; `None` when the open left the channel disabled.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.id
    }

    pub fn is_live(&self) -> bool {
        match (self.id, self.shared.upgrade()) {
            (Some(id), Some(shared)) => shared.lock().is_live(id),
            _ => false,
        }
    }

    /// Terminate this handle's connection. Idempotent.
    pub fn close(&self) {
        let (Some(id), Some(shared)) = (self.id, self.shared.upgrade()) else {
            return;
        };
        if shared.close(Some(id)).is_some() {
            info!(connection = %id, "SSE connection closed");
        }
    }
}

/// Supervises one server-push subscription.
#[derive(Debug)]
pub struct TelemetryChannel {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    runtime: Handle,
}

impl TelemetryChannel {
    /// Create a disabled channel.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; connection tasks are spawned on the runtime
    /// current at construction.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (snapshot, _) = watch::channel(ChannelSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                snapshot,
            }),
            transport,
            runtime: Handle::current(),
        }
    }

    /// Start supervising `config`. Returns immediately; the connection is made in the background.
    ///
    /// Any previous connection is closed first. A disabled config (inactive or empty endpoint)
    /// leaves the channel `Disabled` without touching the latest payload or error.
    pub fn open(&self, config: ChannelConfig) -> ChannelHandle {
        let mut inner = self.shared.lock();
        if let Some(previous) = inner.abort_live() {
            debug!(connection = %previous, "closed previous SSE connection");
        }
        inner.config = Some(config.clone());

        if !config.is_enabled() {
            self.shared.snapshot.send_if_modified(|s| {
                let changed = s.state != ChannelState::Disabled || s.connection.is_some();
                s.state = ChannelState::Disabled;
                s.connection = None;
                changed
            });
            debug!(active = config.active, endpoint = %config.endpoint, "channel disabled");
            return ChannelHandle::detached();
        }

        let id = inner.next_connection_id();
        info!(
            connection = %id,
            endpoint = %config.endpoint,
            event_kind = %config.event_kind,
            "opening SSE connection"
        );
        let task = self.runtime.spawn(run_connection(
            Arc::clone(&self.shared),
            Arc::clone(&self.transport),
            config,
            id,
        ));
        inner.live = Some(Live { id, task });
        self.shared.snapshot.send_modify(|s| {
            s.state = ChannelState::Connecting;
            s.connection = Some(id);
        });

        ChannelHandle {
            id: Some(id),
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Open again with the last config. The manual recovery path after a failure.
    pub fn reopen(&self) -> Option<ChannelHandle> {
        let config = self.shared.lock().config.clone()?;
        Some(self.open(config))
    }

    /// Terminate the live connection, if any. Idempotent.
    pub fn close(&self) {
        if let Some(id) = self.shared.close(None) {
            info!(connection = %id, "SSE connection closed");
        }
    }

    pub fn config(&self) -> Option<ChannelConfig> {
        self.shared.lock().config.clone()
    }

    pub fn live_connection(&self) -> Option<ConnectionId> {
        self.shared.lock().live.as_ref().map(|l| l.id)
    }

    pub fn state(&self) -> ChannelState {
        self.shared.snapshot.borrow().state
    }

    pub fn latest_payload(&self) -> Option<Value> {
        self.shared.snapshot.borrow().payload.clone()
    }

    pub fn latest_error(&self) -> Option<ChannelError> {
        self.shared.snapshot.borrow().error.clone()
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Receiver that is notified on every output change.
    pub fn watch(&self) -> watch::Receiver<ChannelSnapshot> {
        self.shared.snapshot.subscribe()
    }
}

impl Drop for TelemetryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    config: ChannelConfig,
    id: ConnectionId,
) {
    let mut events = match transport.connect(&config.endpoint).await {
        Ok(events) => events,
        Err(e) => {
            warn!(connection = %id, endpoint = %config.endpoint, error = %e, "SSE connection failed");
            shared.fail(id, e);
            return;
        }
    };

    let connected = shared.apply(id, |s| {
        s.state = ChannelState::Connected;
        s.error = None;
    });
    if !connected {
        return;
    }
    info!(connection = %id, endpoint = %config.endpoint, "SSE connection established");

    while let Some(item) = events.next().await {
        match item {
            Ok(event) if event.kind == config.event_kind => {
                debug!(connection = %id, raw = %event.data, "SSE frame received");
                let accepted = match decode_payload(&event.data) {
                    Ok(value) => shared.apply(id, |s| {
                        s.payload = Some(value);
                        s.payload_seq += 1;
                        s.error = None;
                    }),
                    Err(e) => {
                        warn!(connection = %id, error = %e, raw = %event.data, "failed to decode SSE frame");
                        shared.apply(id, |s| s.error = Some(e))
                    }
                };
                if !accepted {
                    return;
                }
            }
            Ok(event) => {
                trace!(connection = %id, kind = %event.kind, "ignoring frame of another kind");
            }
            Err(e) => {
                warn!(connection = %id, error = %e, "SSE connection error");
                shared.fail(id, e);
                return;
            }
        }
    }

    warn!(connection = %id, "SSE stream closed by server");
    shared.fail(id, ChannelError::Transport("stream closed by server".to_string()));
}
