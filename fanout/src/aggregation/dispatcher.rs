use fanout_config::shared::AggregationConfig;
use metrics::{gauge, histogram};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::aggregation::partitioner::BatchPartitioner;
use crate::aggregation::report::AggregationRunReport;
use crate::aggregation::worker::AggregationWorker;
use crate::error::{ErrorKind, FanoutResult};
use crate::fanout_error;
use crate::metrics::{FANOUT_AGGREGATION_RUN_DURATION_SECONDS, FANOUT_PROMOTED_ROWS};
use crate::store::{AggregateStore, FactStore, JobStore};
use crate::types::JobStatus;
use crate::workers::AggregationWorkerPool;

/// Orchestrates aggregation runs: partition, dispatch, promote.
///
/// The store is cloned into every worker, so it is expected to be a cheap handle such as a
/// connection pool.
#[derive(Debug, Clone)]
pub struct AggregationDispatcher<S> {
    store: S,
    config: AggregationConfig,
}

impl<S> AggregationDispatcher<S>
where
    S: JobStore + FactStore + AggregateStore + Clone + Send + Sync + 'static,
{
    pub fn new(store: S, config: AggregationConfig) -> Self {
        Self { store, config }
    }

    /// Runs a full aggregation from a clean slate.
    ///
    /// Prior job batches and staged rows are discarded, the current key domain is
    /// partitioned, every batch is processed and the staged rows are promoted. Batch failures
    /// are part of the returned report; an error is returned only when partitioning or
    /// promotion fails.
    pub async fn run(&self) -> FanoutResult<AggregationRunReport> {
        let started = Instant::now();

        info!(
            partition_width = self.config.partition_width,
            workers = self.config.worker_count(),
            "starting aggregation run"
        );

        BatchPartitioner::new(self.config.partition_width)
            .create_job_batches(&self.store)
            .await?;

        let report = self.dispatch_pending().await?;

        histogram!(FANOUT_AGGREGATION_RUN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        Ok(report)
    }

    /// Re-runs the batches a previous run left `failed` or stuck in `processing`.
    ///
    /// Rows staged by batches that already completed are kept, so the promotion that follows
    /// publishes the previous run's results together with the re-run batches.
    pub async fn rerun_failed(&self) -> FanoutResult<AggregationRunReport> {
        let reset = self
            .store
            .reset_job_batches(&[JobStatus::Failed, JobStatus::Processing])
            .await?;

        info!(reset, "reset failed and stale job batches to pending");

        self.dispatch_pending().await
    }

    async fn dispatch_pending(&self) -> FanoutResult<AggregationRunReport> {
        let pending = self
            .store
            .get_job_batches_by_status(JobStatus::Pending)
            .await?;

        if pending.is_empty() {
            info!("no pending job batches, nothing to aggregate");
            return Ok(AggregationRunReport::nothing_pending());
        }

        info!(batches = pending.len(), "dispatching job batches to worker pool");

        let mut pool = AggregationWorkerPool::new(self.config.worker_count());
        for batch in &pending {
            let worker = AggregationWorker::new(batch.batch_id, self.store.clone());
            pool.spawn(batch.batch_id, worker.run());
        }

        let mut report = AggregationRunReport {
            dispatched: pending.len(),
            ..Default::default()
        };

        for (batch_id, result) in pool.wait_all().await {
            match result {
                Ok(_) => report.completed.push(batch_id),
                Err(err) => {
                    // A panicking worker never got to record its failure.
                    if err.kind() == ErrorKind::AggregationWorkerPanic
                        && let Err(status_err) =
                            self.store.fail_job_batch(batch_id, err.summary()).await
                    {
                        error!(
                            batch_id,
                            error = %status_err,
                            "failed to mark panicked job batch as failed"
                        );
                    }

                    report.failed.push((batch_id, err));
                }
            }
        }
        report.completed.sort_unstable();
        report.failed.sort_by_key(|(batch_id, _)| *batch_id);

        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            "all aggregation workers returned, promoting staged aggregates"
        );

        let promoted_rows = self.store.promote_staged_aggregates().await.map_err(|err| {
            fanout_error!(
                ErrorKind::PromotionError,
                "Failed to promote staged aggregates",
                err.summary(),
                source: err
            )
        })?;
        gauge!(FANOUT_PROMOTED_ROWS).set(promoted_rows as f64);
        report.promoted_rows = Some(promoted_rows);

        if report.is_success() {
            info!(promoted_rows, "aggregation run succeeded");
        } else {
            let failed_batches: Vec<_> = report.failed.iter().map(|(batch_id, _)| *batch_id).collect();
            warn!(
                promoted_rows,
                failed_batches = ?failed_batches,
                "aggregation run promoted partial results, some job batches failed"
            );
        }

        Ok(report)
    }
}
