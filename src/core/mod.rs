//! The cache-and-refresh engine and the telemetry collector.

pub mod fetch;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use fetch::FetchEngine;
pub use scheduler::{RefreshScheduler, ACCESS_QUEUE_CAPACITY};
pub use stats::{AccessEvent, StatsAggregator, RETENTION_CEILING, STATS_QUEUE_CAPACITY};
pub use store::FlagStore;
