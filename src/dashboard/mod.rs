//! Consumer-side dashboard state built on top of a subscription channel.

pub mod series;

pub use series::{Alert, LiveSeries, SeriesStats};
