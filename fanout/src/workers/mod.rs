//! Worker pools executing independent units of work.

pub mod pool;

pub use pool::AggregationWorkerPool;
