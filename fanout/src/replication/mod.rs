//! Replication of one source into many sinks.

pub mod conductor;
pub mod report;

pub use conductor::ReplicationConductor;
pub use report::{ReplicationReport, SinkOutcome, SinkProgress};
