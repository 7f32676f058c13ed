use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error};

use crate::error::{ErrorKind, FanoutResult};
use crate::fanout_error;
use crate::types::JobBatchId;

/// Result of one job batch: the number of staged groups, or why the batch failed.
pub type BatchResult = (JobBatchId, FanoutResult<usize>);

/// Bounded pool running one aggregation worker per job batch.
///
/// Every batch is spawned up front, but at most `max_workers` of them run at once: each task
/// first waits for a permit of a shared semaphore. A worker owns exactly one batch and
/// batches never move between workers.
#[derive(Debug)]
pub struct AggregationWorkerPool {
    permits: Arc<Semaphore>,
    join_set: JoinSet<BatchResult>,
    /// Batch owned by each spawned task, used to attribute panics.
    batch_ids: HashMap<Id, JobBatchId>,
}

impl AggregationWorkerPool {
    /// Creates a pool running at most `max_workers` batches at once.
    ///
    /// A `max_workers` of zero is treated as one.
    pub fn new(max_workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_workers.max(1))),
            join_set: JoinSet::new(),
            batch_ids: HashMap::new(),
        }
    }

    /// Spawns the worker future of `batch_id`. It starts once a permit is available.
    pub fn spawn<F>(&mut self, batch_id: JobBatchId, worker: F)
    where
        F: Future<Output = FanoutResult<usize>> + Send + 'static,
    {
        let permits = self.permits.clone();
        let abort_handle = self.join_set.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (
                    batch_id,
                    Err(fanout_error!(
                        ErrorKind::InvalidState,
                        "Worker pool was closed before the batch could start"
                    )),
                );
            };

            (batch_id, worker.await)
        });

        self.batch_ids.insert(abort_handle.id(), batch_id);

        debug!(batch_id, "spawned aggregation worker");
    }

    /// Waits for every spawned worker and returns one result per batch.
    ///
    /// A failing or panicking worker does not cancel the others. Panics are reported as
    /// [`ErrorKind::AggregationWorkerPanic`] for the batch the task owned.
    pub async fn wait_all(&mut self) -> Vec<BatchResult> {
        let mut results = Vec::with_capacity(self.batch_ids.len());

        while let Some(joined) = self.join_set.join_next_with_id().await {
            match joined {
                Ok((id, (batch_id, result))) => {
                    self.batch_ids.remove(&id);
                    results.push((batch_id, result));
                }
                Err(join_err) => {
                    let Some(batch_id) = self.batch_ids.remove(&join_err.id()) else {
                        error!(error = %join_err, "untracked aggregation worker failed");
                        continue;
                    };

                    error!(batch_id, error = %join_err, "aggregation worker panicked");
                    results.push((
                        batch_id,
                        Err(fanout_error!(
                            ErrorKind::AggregationWorkerPanic,
                            "Aggregation worker panicked",
                            join_err
                        )),
                    ));
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn explode() -> FanoutResult<usize> {
        panic!("worker blew up")
    }

    #[tokio::test]
    async fn running_workers_never_exceed_limit() {
        let mut pool = AggregationWorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for batch_id in 1..=6 {
            let running = running.clone();
            let peak = peak.clone();
            pool.spawn(batch_id, async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(1)
            });
        }

        let results = pool.wait_all().await;

        assert_eq!(results.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn failures_and_panics_are_isolated_per_batch() {
        let mut pool = AggregationWorkerPool::new(4);
        pool.spawn(1, async { Ok(3) });
        pool.spawn(2, async {
            Err(fanout_error!(
                ErrorKind::AggregationComputeError,
                "Raw fact has no metric"
            ))
        });
        pool.spawn(3, explode());

        let mut results = pool.wait_all().await;
        results.sort_by_key(|(batch_id, _)| *batch_id);

        assert_eq!(results[0].1.as_ref().unwrap(), &3);
        assert_eq!(
            results[1].1.as_ref().unwrap_err().kind(),
            ErrorKind::AggregationComputeError
        );
        assert_eq!(
            results[2].1.as_ref().unwrap_err().kind(),
            ErrorKind::AggregationWorkerPanic
        );
    }
}
