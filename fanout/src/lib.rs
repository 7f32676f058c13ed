//! Incremental replication of one source into many sinks, and partitioned aggregation of
//! the replicated facts.
//!
//! The [`replication`] module drives every [`sink::Sink`] to convergence against a
//! [`source::Source`], concurrently and with failures isolated per sink. The
//! [`aggregation`] module partitions the fact key domain into job batches, processes them
//! on a bounded worker pool and atomically promotes the staged results. The [`audit`]
//! module samples replicated data and reports drift.

pub mod aggregation;
pub mod audit;
pub mod concurrency;
pub mod error;
mod macros;
pub mod metrics;
pub mod replication;
pub mod sink;
pub mod source;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
