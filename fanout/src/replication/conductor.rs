use fanout_config::shared::ReplicationConfig;
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::bail;
use crate::concurrency::deadline::with_deadline;
use crate::error::{ErrorKind, FanoutResult};
use crate::fanout_error;
use crate::metrics::{
    ERROR_KIND_LABEL, FANOUT_APPLY_BATCH_DURATION_SECONDS, FANOUT_BATCHES_APPLIED_TOTAL,
    FANOUT_RECORDS_APPLIED_TOTAL, FANOUT_SINK_FAILURES_TOTAL, SINK_LABEL,
};
use crate::replication::report::{ReplicationReport, SinkOutcome, SinkProgress};
use crate::sink::Sink;
use crate::source::Source;
use crate::types::Record;

/// Drives every sink to convergence against one source.
///
/// Each sink runs its own loop on its own task: read the sink's position, then alternately
/// read a batch after that position and apply it, until the source returns an empty batch.
/// Sinks progress independently and a failing sink does not stop the others.
pub struct ReplicationConductor<R: Record, S> {
    source: Arc<S>,
    sinks: Vec<Arc<dyn Sink<R>>>,
    config: ReplicationConfig,
}

impl<R, S> ReplicationConductor<R, S>
where
    R: Record,
    S: Source<R> + Send + Sync + 'static,
{
    pub fn new(source: S, sinks: Vec<Arc<dyn Sink<R>>>, config: ReplicationConfig) -> Self {
        Self {
            source: Arc::new(source),
            sinks,
            config,
        }
    }

    /// Runs every sink's loop to its fixed point and reports the outcome of each.
    ///
    /// Returns once every loop has finished, successfully or not. A panicking sink task is
    /// reported as [`ErrorKind::SinkWorkerPanic`] for that sink.
    pub async fn run(&self) -> ReplicationReport<R::Position> {
        info!(
            source = self.source.name(),
            sinks = self.sinks.len(),
            batch_size = self.config.batch_size,
            "starting replication run"
        );

        let mut join_set = JoinSet::new();
        let mut sink_indexes = HashMap::with_capacity(self.sinks.len());

        for (index, sink) in self.sinks.iter().enumerate() {
            let source = self.source.clone();
            let sink = sink.clone();
            let batch_size = self.config.batch_size;
            let timeout = self.config.operation_timeout();

            let abort_handle = join_set.spawn(async move {
                let result = replicate_sink(source.as_ref(), sink.as_ref(), batch_size, timeout).await;
                (index, result)
            });
            sink_indexes.insert(abort_handle.id(), index);
        }

        let mut results = Vec::with_capacity(self.sinks.len());
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((_, (index, result))) => results.push((index, result)),
                Err(join_err) => {
                    let Some(&index) = sink_indexes.get(&join_err.id()) else {
                        error!(error = %join_err, "untracked sink task failed");
                        continue;
                    };

                    results.push((
                        index,
                        Err(fanout_error!(
                            ErrorKind::SinkWorkerPanic,
                            "Sink replication task panicked",
                            join_err
                        )),
                    ));
                }
            }
        }
        results.sort_by_key(|(index, _)| *index);

        let outcomes = results
            .into_iter()
            .map(|(index, result)| {
                let sink = self.sinks[index].name().to_string();

                match &result {
                    Ok(progress) => info!(
                        sink = %sink,
                        start_position = ?progress.start_position,
                        final_position = ?progress.final_position,
                        batches = progress.batches_applied,
                        records = progress.records_applied,
                        "sink converged"
                    ),
                    Err(err) => {
                        counter!(
                            FANOUT_SINK_FAILURES_TOTAL,
                            SINK_LABEL => sink.clone(),
                            ERROR_KIND_LABEL => format!("{:?}", err.kind())
                        )
                        .increment(1);
                        error!(sink = %sink, error = %err, "sink replication failed");
                    }
                }

                SinkOutcome { sink, result }
            })
            .collect();

        ReplicationReport::new(outcomes)
    }
}

/// Replicates `source` into `sink` until the source has nothing beyond the sink's position.
async fn replicate_sink<R, S>(
    source: &S,
    sink: &dyn Sink<R>,
    batch_size: usize,
    timeout: Option<Duration>,
) -> FanoutResult<SinkProgress<R::Position>>
where
    R: Record,
    S: Source<R>,
{
    let start_position = with_deadline(timeout, sink.current_position()).await?;
    let mut progress = SinkProgress {
        final_position: start_position.clone(),
        start_position,
        batches_applied: 0,
        records_applied: 0,
    };

    info!(sink = sink.name(), position = ?progress.start_position, "resuming sink");

    loop {
        let position = progress.final_position.clone();
        let batch = with_deadline(timeout, source.read_batch(batch_size, &position)).await?;
        if batch.is_empty() {
            break;
        }

        // Applying records at or before the position would move the resume point backwards.
        if let Some(first_position) = batch.first_position()
            && first_position <= position
        {
            bail!(
                ErrorKind::InvalidBatch,
                "Source returned records at or before the requested position",
                format!("requested records after {position:?}, got {first_position:?}")
            );
        }

        let started = Instant::now();
        with_deadline(timeout, sink.apply_batch(&batch)).await?;
        histogram!(FANOUT_APPLY_BATCH_DURATION_SECONDS, SINK_LABEL => sink.name().to_string())
            .record(started.elapsed().as_secs_f64());

        progress.final_position = source.next_position(&batch);
        progress.batches_applied += 1;
        progress.records_applied += batch.len() as u64;

        counter!(FANOUT_BATCHES_APPLIED_TOTAL, SINK_LABEL => sink.name().to_string()).increment(1);
        counter!(FANOUT_RECORDS_APPLIED_TOTAL, SINK_LABEL => sink.name().to_string())
            .increment(batch.len() as u64);

        debug!(
            sink = sink.name(),
            records = batch.len(),
            position = ?progress.final_position,
            "applied batch"
        );
    }

    Ok(progress)
}
