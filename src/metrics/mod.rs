//! Activity metrics collection.
//!
//! The aggregator fetches one project's metrics; the collector runs it
//! over every eligible registration of a pool.

pub mod aggregator;
pub mod collector;

pub use aggregator::{MetricsAggregator, RetryPolicy};
pub use collector::PoolMetricsCollector;
