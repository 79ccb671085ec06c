//! Client side of the feed: event-stream framing, transport, and the subscription channel.

pub mod frame;
pub mod subscription;
pub mod transport;

pub use frame::{decode_payload, FrameDecoder, SseEvent};
pub use subscription::{
    ChannelConfig, ChannelHandle, ChannelSnapshot, ChannelState, ConnectionId, TelemetryChannel,
};
pub use transport::{EventStream, HttpTransport, Transport};
