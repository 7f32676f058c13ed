//! Core data types shared by replication and aggregation.

mod aggregate;
mod batch;
mod job;
mod movies;
mod position;

pub use aggregate::{AggregateRow, RawFact};
pub use batch::RecordBatch;
pub use job::{JobBatch, JobBatchId, JobStatus, KeyRange};
pub use movies::{MovieRecord, RatingRecord};
pub use position::{Position, Record};
