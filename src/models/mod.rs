//! Data models for feed records, ingestion bodies and topics.

pub mod event;
pub mod notification;
pub mod reading;

pub use event::*;
pub use notification::*;
pub use reading::*;
