use std::collections::BTreeMap;
use std::future::Future;

use crate::error::FanoutResult;
use crate::types::{AggregateRow, JobBatch, JobBatchId, JobStatus, KeyRange, RawFact};

/// Storage of job batches.
///
/// Every worker only touches the batch it owns, so implementations need no locking between
/// workers beyond what single-row updates already give.
pub trait JobStore {
    /// Discards every job batch and every staged aggregate, then inserts `ranges` as
    /// `pending` batches with ids assigned from 1 in order.
    ///
    /// The whole operation is atomic: either the previous run's state is fully replaced or it
    /// is left untouched.
    fn recreate_job_batches(
        &self,
        ranges: Vec<KeyRange>,
    ) -> impl Future<Output = FanoutResult<Vec<JobBatch>>> + Send;

    /// Returns the job batch with `batch_id`, if it exists.
    fn get_job_batch(
        &self,
        batch_id: JobBatchId,
    ) -> impl Future<Output = FanoutResult<Option<JobBatch>>> + Send;

    /// Returns every job batch ordered by id.
    fn get_job_batches(&self) -> impl Future<Output = FanoutResult<Vec<JobBatch>>> + Send;

    /// Returns the job batches in `status` ordered by id.
    fn get_job_batches_by_status(
        &self,
        status: JobStatus,
    ) -> impl Future<Output = FanoutResult<Vec<JobBatch>>> + Send;

    /// Sets the status of a job batch.
    ///
    /// Fails with [`crate::error::ErrorKind::InvalidState`] when the batch does not exist.
    fn update_job_batch_status(
        &self,
        batch_id: JobBatchId,
        status: JobStatus,
    ) -> impl Future<Output = FanoutResult<()>> + Send;

    /// Marks a job batch `failed` and records why.
    fn fail_job_batch(
        &self,
        batch_id: JobBatchId,
        reason: String,
    ) -> impl Future<Output = FanoutResult<()>> + Send;

    /// Moves every job batch in one of `statuses` back to `pending`, clearing its last error.
    ///
    /// Returns the number of batches that were reset.
    fn reset_job_batches(
        &self,
        statuses: &[JobStatus],
    ) -> impl Future<Output = FanoutResult<u64>> + Send;
}

/// Read access to the raw facts being aggregated.
pub trait FactStore {
    /// Returns the inclusive key domain to aggregate over, or `None` when it is empty.
    fn fact_key_domain(&self) -> impl Future<Output = FanoutResult<Option<KeyRange>>> + Send;

    /// Returns every fact whose group key lies in `range`.
    fn read_facts(
        &self,
        range: KeyRange,
    ) -> impl Future<Output = FanoutResult<Vec<RawFact>>> + Send;

    /// Returns the distinct group keys that have at least one fact, ascending.
    fn fact_group_keys(&self) -> impl Future<Output = FanoutResult<Vec<i64>>> + Send;
}

/// Storage of staged and live aggregates.
pub trait AggregateStore {
    /// Replaces the staged rows within the key range of `batch_id` with `rows` and marks the
    /// batch `complete`, atomically.
    ///
    /// Re-running a batch therefore never stages its groups twice. A failure leaves neither staged rows nor a status change behind.
    fn commit_batch_aggregates(
        &self,
        batch_id: JobBatchId,
        rows: Vec<AggregateRow>,
    ) -> impl Future<Output = FanoutResult<()>> + Send;

    /// Returns every staged row ordered by group key.
    fn staged_aggregates(&self) -> impl Future<Output = FanoutResult<Vec<AggregateRow>>> + Send;

    /// Replaces the live aggregates with the staged rows in one transaction.
    ///
    /// Readers of the live table observe either the previous contents or the new ones,
    /// never a mix. Returns the number of promoted rows.
    fn promote_staged_aggregates(&self) -> impl Future<Output = FanoutResult<u64>> + Send;

    /// Returns every live row ordered by group key.
    fn live_aggregates(&self) -> impl Future<Output = FanoutResult<Vec<AggregateRow>>> + Send;

    /// Returns the live rows of `group_keys` that exist.
    fn get_live_aggregates(
        &self,
        group_keys: &[i64],
    ) -> impl Future<Output = FanoutResult<BTreeMap<i64, AggregateRow>>> + Send;
}
