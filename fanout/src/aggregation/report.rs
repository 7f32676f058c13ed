use crate::error::{FanoutError, FanoutResult};
use crate::types::JobBatchId;

/// Outcome of an aggregation run or of an operator re-run.
#[derive(Debug, Clone, Default)]
pub struct AggregationRunReport {
    /// Number of job batches dispatched to workers.
    pub dispatched: usize,
    /// Batches that staged their aggregates, ascending.
    pub completed: Vec<JobBatchId>,
    /// Batches that failed, ascending, with the error that failed them.
    pub failed: Vec<(JobBatchId, FanoutError)>,
    /// Rows in the live table after promotion, `None` when nothing was dispatched and the
    /// live table was left untouched.
    pub promoted_rows: Option<u64>,
}

impl AggregationRunReport {
    /// Report of a run that found no pending batches.
    pub fn nothing_pending() -> Self {
        Self::default()
    }

    /// Returns `true` if no batch failed.
    ///
    /// A run with failed batches still promotes the successful ones, yet it is reported as
    /// failed so that an incomplete live table is not mistaken for a complete one.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns the number of promoted rows, or every batch failure aggregated into one error.
    pub fn into_result(self) -> FanoutResult<Option<u64>> {
        if self.failed.is_empty() {
            return Ok(self.promoted_rows);
        }

        let errors: Vec<FanoutError> = self.failed.into_iter().map(|(_, err)| err).collect();
        Err(errors.into())
    }
}
