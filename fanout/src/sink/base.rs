use async_trait::async_trait;

use crate::error::FanoutResult;
use crate::types::{Record, RecordBatch};

/// A replication target.
///
/// A sink owns its resume position: it is derived from data already durably written, never
/// from in-memory state, so a sink resumes exactly where it stopped after a crash and
/// progresses independently of every other sink.
///
/// The trait is object safe so that sinks backed by different stores can be driven by the
/// same conductor.
#[async_trait]
pub trait Sink<R: Record>: Send + Sync {
    /// Returns the name of the sink, used in reports, logs and metrics.
    fn name(&self) -> &str;

    /// Returns the position of the last durably applied record, or the zero position when
    /// the sink holds no data.
    async fn current_position(&self) -> FanoutResult<R::Position>;

    /// Durably applies `batch` with upsert semantics keyed by each record's natural key.
    ///
    /// Applying the same batch twice must leave the sink as applying it once. Persistence
    /// failures are returned to the caller, no retry happens here.
    async fn apply_batch(&self, batch: &RecordBatch<R>) -> FanoutResult<()>;
}
