use metrics::counter;
use tracing::{error, info, warn};

use crate::aggregation::compute::aggregate_facts;
use crate::bail;
use crate::error::{ErrorKind, FanoutResult};
use crate::metrics::{ERROR_KIND_LABEL, FANOUT_JOB_BATCHES_TOTAL, OUTCOME_LABEL};
use crate::store::{AggregateStore, FactStore, JobStore};
use crate::types::{JobBatchId, JobStatus};

/// Aggregates the raw facts of one job batch into staged rows.
///
/// The worker receives only the batch id and resolves the key range through the store. The
/// batch moves `pending -> processing -> complete` or `pending -> processing -> failed`;
/// `processing` is written before anything else, so a crash mid batch stays visible.
#[derive(Debug)]
pub struct AggregationWorker<S> {
    batch_id: JobBatchId,
    store: S,
}

impl<S> AggregationWorker<S>
where
    S: JobStore + FactStore + AggregateStore,
{
    pub fn new(batch_id: JobBatchId, store: S) -> Self {
        Self { batch_id, store }
    }

    /// Processes the batch and returns the number of staged groups.
    ///
    /// On failure the batch is marked `failed` with the error summary and the error is
    /// returned. The batch is not retried.
    pub async fn run(self) -> FanoutResult<usize> {
        let batch_id = self.batch_id;

        match self.process().await {
            Ok(groups) => {
                counter!(FANOUT_JOB_BATCHES_TOTAL, OUTCOME_LABEL => JobStatus::Complete.as_static_str())
                    .increment(1);
                info!(batch_id, groups, "job batch complete");

                Ok(groups)
            }
            Err(err) => {
                counter!(
                    FANOUT_JOB_BATCHES_TOTAL,
                    OUTCOME_LABEL => JobStatus::Failed.as_static_str(),
                    ERROR_KIND_LABEL => format!("{:?}", err.kind())
                )
                .increment(1);
                error!(batch_id, error = %err, "failed to process job batch");

                if let Err(status_err) = self.store.fail_job_batch(batch_id, err.summary()).await {
                    error!(
                        batch_id,
                        error = %status_err,
                        "failed to mark job batch as failed, it remains in processing"
                    );
                }

                Err(err)
            }
        }
    }

    async fn process(&self) -> FanoutResult<usize> {
        let batch_id = self.batch_id;

        self.store
            .update_job_batch_status(batch_id, JobStatus::Processing)
            .await?;

        let Some(batch) = self.store.get_job_batch(batch_id).await? else {
            bail!(
                ErrorKind::InvalidState,
                "Job batch disappeared while processing",
                format!("no job batch with id {batch_id}")
            );
        };

        info!(batch_id, range = %batch.range(), "fetching facts for job batch");
        let facts = self.store.read_facts(batch.range()).await?;

        if facts.is_empty() {
            warn!(batch_id, "no facts in job batch range, marking it complete");
            self.store
                .update_job_batch_status(batch_id, JobStatus::Complete)
                .await?;

            return Ok(0);
        }

        let rows = aggregate_facts(&facts)?;
        let groups = rows.len();

        info!(batch_id, facts = facts.len(), groups, "staging job batch aggregates");
        self.store.commit_batch_aggregates(batch_id, rows).await?;

        Ok(groups)
    }
}
