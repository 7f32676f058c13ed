use fanout::error::ErrorKind;
use fanout::replication::{ReplicationConductor, SinkProgress};
use fanout::sink::Sink;
use fanout::sink::memory::MemorySink;
use fanout::source::memory::MemorySource;
use fanout::test_utils::faulty_sink::{FaultySink, SinkFault};
use fanout::test_utils::fixtures::{movie_batch, movies, ratings};
use fanout::types::{MovieRecord, RatingRecord};
use fanout_config::shared::ReplicationConfig;
use fanout_telemetry::tracing::init_test_tracing;
use std::sync::Arc;
use std::time::Duration;

fn config(batch_size: usize) -> ReplicationConfig {
    ReplicationConfig {
        batch_size,
        operation_timeout_ms: None,
    }
}

fn movie_source(ids: std::ops::RangeInclusive<i64>) -> MemorySource<MovieRecord> {
    MemorySource::with_records("mysql", movies(ids))
}

#[tokio::test(flavor = "multi_thread")]
async fn every_sink_converges_to_the_source() {
    init_test_tracing();

    let source = movie_source(1..=10);
    let first = MemorySink::new("postgres");
    let second = MemorySink::new("graph");

    let conductor = ReplicationConductor::new(
        source,
        vec![
            Arc::new(first.clone()) as Arc<dyn Sink<MovieRecord>>,
            Arc::new(second.clone()),
        ],
        config(5),
    );
    let report = conductor.run().await;

    assert!(report.is_success());
    for (_, progress) in report.succeeded() {
        assert_eq!(
            progress,
            &SinkProgress {
                start_position: 0,
                final_position: 10,
                batches_applied: 2,
                records_applied: 10,
            }
        );
    }
    assert_eq!(first.records().await, movies(1..=10));
    assert_eq!(second.records().await, movies(1..=10));
}

#[tokio::test(flavor = "multi_thread")]
async fn sinks_resume_from_their_own_position() {
    init_test_tracing();

    let source = movie_source(1..=10);
    let behind = MemorySink::new("behind");
    behind.apply_batch(&movie_batch(1..=4)).await.unwrap();
    let empty = MemorySink::new("empty");

    let conductor = ReplicationConductor::new(
        source,
        vec![
            Arc::new(behind.clone()) as Arc<dyn Sink<MovieRecord>>,
            Arc::new(empty.clone()),
        ],
        config(5),
    );
    let report = conductor.run().await;

    let behind_progress = report.outcome("behind").unwrap().result.as_ref().unwrap();
    assert_eq!(behind_progress.start_position, 4);
    assert_eq!(behind_progress.final_position, 10);
    assert_eq!(behind_progress.batches_applied, 2);
    assert_eq!(behind_progress.records_applied, 6);

    let empty_progress = report.outcome("empty").unwrap().result.as_ref().unwrap();
    assert_eq!(empty_progress.start_position, 0);
    assert_eq!(empty_progress.records_applied, 10);

    assert_eq!(behind.records().await, empty.records().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn rerunning_a_converged_sink_applies_nothing() {
    init_test_tracing();

    let source = movie_source(1..=10);
    let sink = MemorySink::new("postgres");
    let sinks = vec![Arc::new(sink.clone()) as Arc<dyn Sink<MovieRecord>>];

    let conductor = ReplicationConductor::new(source, sinks, config(5));
    conductor.run().await.into_result().unwrap();
    let applied = sink.applied_batches().await;

    let report = conductor.run().await;

    let progress = report.outcome("postgres").unwrap().result.as_ref().unwrap();
    assert_eq!(progress.start_position, 10);
    assert_eq!(progress.final_position, 10);
    assert_eq!(progress.batches_applied, 0);
    assert_eq!(sink.applied_batches().await, applied);
    assert_eq!(sink.records().await, movies(1..=10));
}

#[tokio::test(flavor = "multi_thread")]
async fn records_added_to_the_source_are_picked_up_on_the_next_run() {
    init_test_tracing();

    let source = movie_source(1..=10);
    let sink = MemorySink::new("postgres");
    let conductor = ReplicationConductor::new(
        source.clone(),
        vec![Arc::new(sink.clone()) as Arc<dyn Sink<MovieRecord>>],
        config(5),
    );
    conductor.run().await.into_result().unwrap();

    for movie in movies(11..=12) {
        source.insert(movie).await;
    }
    let report = conductor.run().await;

    let progress = report.outcome("postgres").unwrap().result.as_ref().unwrap();
    assert_eq!(progress.start_position, 10);
    assert_eq!(progress.final_position, 12);
    assert_eq!(progress.batches_applied, 1);
    assert_eq!(sink.records().await, movies(1..=12));
}

#[tokio::test(flavor = "multi_thread")]
async fn composite_positions_resume_lexicographically() {
    init_test_tracing();

    let all = ratings(1..=3, 1..=4);
    let source = MemorySource::with_records("mysql", all.clone());
    let sink = MemorySink::new("postgres");

    let conductor = ReplicationConductor::new(
        source,
        vec![Arc::new(sink.clone()) as Arc<dyn Sink<RatingRecord>>],
        config(5),
    );
    let progress = conductor.run().await.into_result().unwrap();

    assert_eq!(progress[0].1.final_position, (3, 4));
    assert_eq!(progress[0].1.batches_applied, 3);
    assert_eq!(sink.records().await, all);
}

#[tokio::test(flavor = "multi_thread")]
async fn a_failing_sink_does_not_stop_the_others() {
    init_test_tracing();

    let source = movie_source(1..=10);
    let healthy = MemorySink::new("healthy");
    let faulty = FaultySink::new(MemorySink::new("faulty"), SinkFault::FailApplyAt(2));

    let conductor = ReplicationConductor::new(
        source.clone(),
        vec![
            Arc::new(faulty.clone()) as Arc<dyn Sink<MovieRecord>>,
            Arc::new(healthy.clone()),
        ],
        config(5),
    );
    let report = conductor.run().await;

    assert!(!report.is_success());
    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "faulty");
    assert_eq!(failed[0].1.kind(), ErrorKind::ApplyError);

    assert_eq!(healthy.records().await, movies(1..=10));
    // The first batch was durably applied before the failure.
    assert_eq!(faulty.inner().records().await, movies(1..=5));

    // A later run resumes after the last applied batch.
    let conductor = ReplicationConductor::new(
        source,
        vec![Arc::new(faulty.inner().clone()) as Arc<dyn Sink<MovieRecord>>],
        config(5),
    );
    let progress = conductor.run().await.into_result().unwrap();

    assert_eq!(progress[0].1.start_position, 5);
    assert_eq!(progress[0].1.batches_applied, 1);
    assert_eq!(faulty.inner().records().await, movies(1..=10));
}

#[tokio::test(flavor = "multi_thread")]
async fn an_unreachable_sink_is_reported_as_a_connectivity_error() {
    init_test_tracing();

    let source = movie_source(1..=3);
    let unreachable = FaultySink::new(MemorySink::new("unreachable"), SinkFault::Unreachable);
    let healthy = MemorySink::new("healthy");

    let conductor = ReplicationConductor::new(
        source,
        vec![
            Arc::new(unreachable.clone()) as Arc<dyn Sink<MovieRecord>>,
            Arc::new(healthy.clone()),
        ],
        config(5),
    );
    let report = conductor.run().await;

    let err = report.outcome("unreachable").unwrap().result.as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectivityError);
    assert_eq!(unreachable.apply_calls(), 0);
    assert!(report.outcome("healthy").unwrap().result.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn a_panicking_sink_is_reported_without_affecting_the_others() {
    init_test_tracing();

    let source = movie_source(1..=10);
    let panicking = FaultySink::new(MemorySink::new("panicking"), SinkFault::PanicApplyAt(1));
    let healthy = MemorySink::new("healthy");

    let conductor = ReplicationConductor::new(
        source,
        vec![
            Arc::new(panicking) as Arc<dyn Sink<MovieRecord>>,
            Arc::new(healthy.clone()),
        ],
        config(5),
    );
    let report = conductor.run().await;

    // Outcomes keep configuration order whatever the completion order.
    assert_eq!(report.outcomes()[0].sink, "panicking");
    assert_eq!(report.outcomes()[1].sink, "healthy");

    let err = report.outcomes()[0].result.as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SinkWorkerPanic);
    assert_eq!(healthy.records().await, movies(1..=10));
}

#[tokio::test(start_paused = true)]
async fn a_sink_exceeding_the_deadline_fails_alone() {
    init_test_tracing();

    let source = movie_source(1..=10);
    let slow = FaultySink::new(
        MemorySink::new("slow"),
        SinkFault::SlowApply(Duration::from_secs(30)),
    );
    let healthy = MemorySink::new("healthy");

    let conductor = ReplicationConductor::new(
        source,
        vec![
            Arc::new(slow.clone()) as Arc<dyn Sink<MovieRecord>>,
            Arc::new(healthy.clone()),
        ],
        ReplicationConfig {
            batch_size: 5,
            operation_timeout_ms: Some(1_000),
        },
    );
    let report = conductor.run().await;

    let err = report.outcome("slow").unwrap().result.as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    assert!(slow.inner().records().await.is_empty());
    assert_eq!(healthy.records().await, movies(1..=10));
}

#[tokio::test(flavor = "multi_thread")]
async fn into_result_aggregates_every_sink_failure() {
    init_test_tracing();

    let source = movie_source(1..=10);
    let conductor = ReplicationConductor::new(
        source,
        vec![
            Arc::new(FaultySink::new(
                MemorySink::new("rejecting"),
                SinkFault::FailApplyAt(1),
            )) as Arc<dyn Sink<MovieRecord>>,
            Arc::new(FaultySink::new(
                MemorySink::new("unreachable"),
                SinkFault::Unreachable,
            )),
            Arc::new(MemorySink::new("healthy")),
        ],
        config(5),
    );

    let err = conductor.run().await.into_result().unwrap_err();

    assert_eq!(
        err.kinds(),
        vec![ErrorKind::ApplyError, ErrorKind::ConnectivityError]
    );
}
