use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, FanoutResult};
use crate::store::{AggregateStore, FactStore, JobStore};
use crate::types::{AggregateRow, JobBatch, JobBatchId, JobStatus, KeyRange, RawFact};

/// Inner state of [`MemoryAggregationStore`].
#[derive(Debug, Default)]
struct Inner {
    /// Raw facts, in insertion order.
    facts: Vec<RawFact>,
    /// Explicit key domain. When unset the domain spans the group keys of `facts`.
    key_domain: Option<KeyRange>,
    job_batches: BTreeMap<JobBatchId, JobBatch>,
    staged: Vec<AggregateRow>,
    live: BTreeMap<i64, AggregateRow>,
}

impl Inner {
    fn job_batch_mut(&mut self, batch_id: JobBatchId) -> FanoutResult<&mut JobBatch> {
        match self.job_batches.get_mut(&batch_id) {
            Some(batch) => Ok(batch),
            None => bail!(
                ErrorKind::InvalidState,
                "Job batch does not exist",
                format!("no job batch with id {batch_id}")
            ),
        }
    }
}

/// In-memory job, fact and aggregate store for tests and development.
///
/// Every operation holds the store lock for its whole duration, which makes multi step
/// operations such as [`AggregateStore::commit_batch_aggregates`] and
/// [`AggregateStore::promote_staged_aggregates`] atomic.
#[derive(Debug, Clone, Default)]
pub struct MemoryAggregationStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryAggregationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `facts`.
    pub fn with_facts(facts: impl IntoIterator<Item = RawFact>) -> Self {
        let inner = Inner {
            facts: facts.into_iter().collect(),
            ..Default::default()
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub async fn insert_facts(&self, facts: impl IntoIterator<Item = RawFact>) {
        let mut inner = self.inner.lock().await;
        inner.facts.extend(facts);
    }

    /// Overrides the key domain, which otherwise spans the stored facts.
    ///
    /// Mirrors a catalog that contains keys without any facts.
    pub async fn set_key_domain(&self, domain: Option<KeyRange>) {
        let mut inner = self.inner.lock().await;
        inner.key_domain = domain;
    }
}

impl JobStore for MemoryAggregationStore {
    async fn recreate_job_batches(&self, ranges: Vec<KeyRange>) -> FanoutResult<Vec<JobBatch>> {
        let mut inner = self.inner.lock().await;

        inner.job_batches.clear();
        inner.staged.clear();

        for (batch_id, range) in (1..).zip(ranges) {
            inner.job_batches.insert(
                batch_id,
                JobBatch {
                    batch_id,
                    start_key: range.start_key,
                    end_key: range.end_key,
                    status: JobStatus::Pending,
                    last_error: None,
                },
            );
        }

        Ok(inner.job_batches.values().cloned().collect())
    }

    async fn get_job_batch(&self, batch_id: JobBatchId) -> FanoutResult<Option<JobBatch>> {
        let inner = self.inner.lock().await;

        Ok(inner.job_batches.get(&batch_id).cloned())
    }

    async fn get_job_batches(&self) -> FanoutResult<Vec<JobBatch>> {
        let inner = self.inner.lock().await;

        Ok(inner.job_batches.values().cloned().collect())
    }

    async fn get_job_batches_by_status(&self, status: JobStatus) -> FanoutResult<Vec<JobBatch>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .job_batches
            .values()
            .filter(|batch| batch.status == status)
            .cloned()
            .collect())
    }

    async fn update_job_batch_status(
        &self,
        batch_id: JobBatchId,
        status: JobStatus,
    ) -> FanoutResult<()> {
        let mut inner = self.inner.lock().await;
        inner.job_batch_mut(batch_id)?.status = status;

        Ok(())
    }

    async fn fail_job_batch(&self, batch_id: JobBatchId, reason: String) -> FanoutResult<()> {
        let mut inner = self.inner.lock().await;

        let batch = inner.job_batch_mut(batch_id)?;
        batch.status = JobStatus::Failed;
        batch.last_error = Some(reason);

        Ok(())
    }

    async fn reset_job_batches(&self, statuses: &[JobStatus]) -> FanoutResult<u64> {
        let mut inner = self.inner.lock().await;

        let mut reset = 0;
        for batch in inner.job_batches.values_mut() {
            if statuses.contains(&batch.status) {
                batch.status = JobStatus::Pending;
                batch.last_error = None;
                reset += 1;
            }
        }

        Ok(reset)
    }
}

impl FactStore for MemoryAggregationStore {
    async fn fact_key_domain(&self) -> FanoutResult<Option<KeyRange>> {
        let inner = self.inner.lock().await;

        if inner.key_domain.is_some() {
            return Ok(inner.key_domain);
        }

        let min = inner.facts.iter().map(|fact| fact.group_key).min();
        let max = inner.facts.iter().map(|fact| fact.group_key).max();

        Ok(min.zip(max).map(|(min, max)| KeyRange::new(min, max)))
    }

    async fn read_facts(&self, range: KeyRange) -> FanoutResult<Vec<RawFact>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .facts
            .iter()
            .filter(|fact| range.contains(fact.group_key))
            .cloned()
            .collect())
    }

    async fn fact_group_keys(&self) -> FanoutResult<Vec<i64>> {
        let inner = self.inner.lock().await;

        let mut keys: Vec<i64> = inner.facts.iter().map(|fact| fact.group_key).collect();
        keys.sort_unstable();
        keys.dedup();

        Ok(keys)
    }
}

impl AggregateStore for MemoryAggregationStore {
    async fn commit_batch_aggregates(
        &self,
        batch_id: JobBatchId,
        rows: Vec<AggregateRow>,
    ) -> FanoutResult<()> {
        let mut inner = self.inner.lock().await;

        // Unknown batches fail before any row is staged.
        let batch = inner.job_batch_mut(batch_id)?;
        batch.status = JobStatus::Complete;
        let range = batch.range();

        inner.staged.retain(|row| !range.contains(row.group_key));
        inner.staged.extend(rows);

        Ok(())
    }

    async fn staged_aggregates(&self) -> FanoutResult<Vec<AggregateRow>> {
        let inner = self.inner.lock().await;

        let mut rows = inner.staged.clone();
        rows.sort_by_key(|row| row.group_key);

        Ok(rows)
    }

    async fn promote_staged_aggregates(&self) -> FanoutResult<u64> {
        let mut inner = self.inner.lock().await;

        let live: BTreeMap<i64, AggregateRow> = inner
            .staged
            .iter()
            .map(|row| (row.group_key, row.clone()))
            .collect();
        let promoted = live.len() as u64;
        inner.live = live;

        Ok(promoted)
    }

    async fn live_aggregates(&self) -> FanoutResult<Vec<AggregateRow>> {
        let inner = self.inner.lock().await;

        Ok(inner.live.values().cloned().collect())
    }

    async fn get_live_aggregates(&self, group_keys: &[i64]) -> FanoutResult<BTreeMap<i64, AggregateRow>> {
        let inner = self.inner.lock().await;

        Ok(group_keys
            .iter()
            .filter_map(|key| inner.live.get(key).map(|row| (*key, row.clone())))
            .collect())
    }
}
