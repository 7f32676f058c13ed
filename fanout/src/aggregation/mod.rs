//! Partitioned aggregation of raw facts.
//!
//! A run partitions the fact key domain into job batches, processes every pending batch on
//! a bounded worker pool, and promotes the staged results into the live table once every
//! worker has returned.

pub mod compute;
pub mod dispatcher;
pub mod partitioner;
pub mod report;
pub mod rounding;
pub mod worker;

pub use dispatcher::AggregationDispatcher;
pub use partitioner::{BatchPartitioner, partition_key_range};
pub use report::AggregationRunReport;
pub use worker::AggregationWorker;
