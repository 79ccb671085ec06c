//! HTTP and SSE request handlers.

pub mod http;
pub mod sse;

pub use http::*;
pub use sse::*;
