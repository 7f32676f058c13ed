use std::future::Future;

use crate::error::FanoutResult;
use crate::types::{Record, RecordBatch};

/// The source of truth records are replicated from.
///
/// Reads must be free of side effects and safe to run concurrently at different positions,
/// because every sink reads the same source from its own resume position. Implementations
/// therefore keep no cursor between calls.
pub trait Source<R: Record> {
    /// Returns the name of the source, used in logs.
    fn name(&self) -> &str;

    /// Reads up to `limit` records whose position is strictly greater than `after_position`,
    /// ascending by position.
    ///
    /// Returns an empty batch when nothing exists beyond `after_position`. A failure to reach
    /// the store must be returned as an error and never as an empty batch, otherwise the
    /// caller would take an outage for convergence.
    fn read_batch(
        &self,
        limit: usize,
        after_position: &R::Position,
    ) -> impl Future<Output = FanoutResult<RecordBatch<R>>> + Send;

    /// Returns the position to resume from after `batch` has been applied.
    ///
    /// This is a pure function of the batch's last record and yields the zero position for an
    /// empty batch.
    fn next_position(&self, batch: &RecordBatch<R>) -> R::Position {
        batch.next_position()
    }
}
