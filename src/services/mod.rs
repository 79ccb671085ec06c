//! Server-side services: the feed hub and the simulated device traffic.

pub mod feed;
pub mod simulator;

pub use feed::FeedService;
pub use simulator::spawn_simulators;
