use std::collections::{BTreeMap, HashSet};

use crate::bail;
use crate::error::{ErrorKind, FanoutResult};
use crate::store::memory::MemoryAggregationStore;
use crate::store::{AggregateStore, FactStore, JobStore};
use crate::types::{AggregateRow, JobBatch, JobBatchId, JobStatus, KeyRange, RawFact};

/// A [`MemoryAggregationStore`] that fails selected operations.
///
/// Faults are fixed at construction; clones share the wrapped store's data.
#[derive(Debug, Clone, Default)]
pub struct FaultyAggregationStore {
    inner: MemoryAggregationStore,
    fail_key_domain: bool,
    fail_commit_for: HashSet<JobBatchId>,
    fail_promotion: bool,
}

impl FaultyAggregationStore {
    pub fn new(inner: MemoryAggregationStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn inner(&self) -> &MemoryAggregationStore {
        &self.inner
    }

    /// Makes reading the key domain fail.
    pub fn fail_key_domain(mut self) -> Self {
        self.fail_key_domain = true;
        self
    }

    /// Makes committing the aggregates of `batch_id` fail.
    pub fn fail_commit_for(mut self, batch_id: JobBatchId) -> Self {
        self.fail_commit_for.insert(batch_id);
        self
    }

    /// Makes promotion fail.
    pub fn fail_promotion(mut self) -> Self {
        self.fail_promotion = true;
        self
    }
}

impl JobStore for FaultyAggregationStore {
    async fn recreate_job_batches(&self, ranges: Vec<KeyRange>) -> FanoutResult<Vec<JobBatch>> {
        self.inner.recreate_job_batches(ranges).await
    }

    async fn get_job_batch(&self, batch_id: JobBatchId) -> FanoutResult<Option<JobBatch>> {
        self.inner.get_job_batch(batch_id).await
    }

    async fn get_job_batches(&self) -> FanoutResult<Vec<JobBatch>> {
        self.inner.get_job_batches().await
    }

    async fn get_job_batches_by_status(&self, status: JobStatus) -> FanoutResult<Vec<JobBatch>> {
        self.inner.get_job_batches_by_status(status).await
    }

    async fn update_job_batch_status(
        &self,
        batch_id: JobBatchId,
        status: JobStatus,
    ) -> FanoutResult<()> {
        self.inner.update_job_batch_status(batch_id, status).await
    }

    async fn fail_job_batch(&self, batch_id: JobBatchId, reason: String) -> FanoutResult<()> {
        self.inner.fail_job_batch(batch_id, reason).await
    }

    async fn reset_job_batches(&self, statuses: &[JobStatus]) -> FanoutResult<u64> {
        self.inner.reset_job_batches(statuses).await
    }
}

impl FactStore for FaultyAggregationStore {
    async fn fact_key_domain(&self) -> FanoutResult<Option<KeyRange>> {
        if self.fail_key_domain {
            bail!(
                ErrorKind::ConnectivityError,
                "Fact store is unreachable",
                "injected key domain failure"
            );
        }

        self.inner.fact_key_domain().await
    }

    async fn read_facts(&self, range: KeyRange) -> FanoutResult<Vec<RawFact>> {
        self.inner.read_facts(range).await
    }

    async fn fact_group_keys(&self) -> FanoutResult<Vec<i64>> {
        self.inner.fact_group_keys().await
    }
}

impl AggregateStore for FaultyAggregationStore {
    async fn commit_batch_aggregates(
        &self,
        batch_id: JobBatchId,
        rows: Vec<AggregateRow>,
    ) -> FanoutResult<()> {
        if self.fail_commit_for.contains(&batch_id) {
            bail!(
                ErrorKind::StoreQueryFailed,
                "Staging insert failed",
                format!("injected commit failure for batch {batch_id}")
            );
        }

        self.inner.commit_batch_aggregates(batch_id, rows).await
    }

    async fn staged_aggregates(&self) -> FanoutResult<Vec<AggregateRow>> {
        self.inner.staged_aggregates().await
    }

    async fn promote_staged_aggregates(&self) -> FanoutResult<u64> {
        if self.fail_promotion {
            bail!(
                ErrorKind::StoreQueryFailed,
                "Promotion transaction failed",
                "injected promotion failure"
            );
        }

        self.inner.promote_staged_aggregates().await
    }

    async fn live_aggregates(&self) -> FanoutResult<Vec<AggregateRow>> {
        self.inner.live_aggregates().await
    }

    async fn get_live_aggregates(
        &self,
        group_keys: &[i64],
    ) -> FanoutResult<BTreeMap<i64, AggregateRow>> {
        self.inner.get_live_aggregates(group_keys).await
    }
}
