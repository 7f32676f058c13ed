use fanout::aggregation::AggregationDispatcher;
use fanout::error::ErrorKind;
use fanout::store::memory::MemoryAggregationStore;
use fanout::store::{AggregateStore, JobStore};
use fanout::test_utils::faulty_store::FaultyAggregationStore;
use fanout::test_utils::fixtures::{decimal, facts, uniform_facts};
use fanout::types::{AggregateRow, JobStatus, KeyRange, RawFact};
use fanout_config::shared::AggregationConfig;
use fanout_telemetry::tracing::init_test_tracing;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn config(partition_width: u64, max_workers: u16) -> AggregationConfig {
    AggregationConfig {
        partition_width,
        max_workers: Some(max_workers),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn full_run_partitions_processes_and_promotes() {
    init_test_tracing();

    let store = MemoryAggregationStore::with_facts(uniform_facts(1..=2500, 2));

    let report = AggregationDispatcher::new(store.clone(), config(1000, 2))
        .run()
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.completed, vec![1, 2, 3]);
    assert_eq!(report.promoted_rows, Some(2500));

    let batches = store.get_job_batches().await.unwrap();
    let ranges: Vec<KeyRange> = batches.iter().map(|batch| batch.range()).collect();
    assert_eq!(
        ranges,
        vec![
            KeyRange::new(1, 1000),
            KeyRange::new(1001, 2000),
            KeyRange::new(2001, 2500),
        ]
    );
    assert!(batches.iter().all(|batch| batch.status == JobStatus::Complete));

    // Each key holds the metrics 1 and 2.
    let live = store.live_aggregates().await.unwrap();
    assert_eq!(live.len(), 2500);
    assert!(live.iter().all(|row| row.metric_value == decimal("1.50000") && row.count == 2));
}

#[tokio::test(flavor = "multi_thread")]
async fn means_are_rounded_to_five_fractional_digits() {
    init_test_tracing();

    let store = MemoryAggregationStore::with_facts(facts(&[
        (7, "1.0"),
        (7, "1.0"),
        (7, "2.0"),
        (9, "0.000004"),
        (9, "0.000006"),
    ]));

    AggregationDispatcher::new(store.clone(), config(10, 1))
        .run()
        .await
        .unwrap();

    let live = store.get_live_aggregates(&[7, 9]).await.unwrap();
    assert_eq!(
        live[&7],
        AggregateRow {
            group_key: 7,
            metric_value: decimal("1.33333"),
            count: 3,
        }
    );
    // A mean of exactly 0.000005 rounds half to even.
    assert_eq!(live[&9].metric_value, decimal("0.00000"));
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_facts_fail_only_their_batch() {
    init_test_tracing();

    let mut all = uniform_facts(1..=2500, 1);
    all.push(RawFact::new(1500, None));
    let store = MemoryAggregationStore::with_facts(all);

    let report = AggregationDispatcher::new(store.clone(), config(1000, 3))
        .run()
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.completed, vec![1, 3]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 2);
    assert_eq!(report.failed[0].1.kind(), ErrorKind::AggregationComputeError);

    // The batches that succeeded are still promoted.
    assert_eq!(report.promoted_rows, Some(1500));
    let live = store.get_live_aggregates(&[1, 1500, 2500]).await.unwrap();
    assert!(live.contains_key(&1));
    assert!(!live.contains_key(&1500));
    assert!(live.contains_key(&2500));

    let failed = store.get_job_batch(2).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.last_error.is_some());

    let err = report.into_result().unwrap_err();
    assert_eq!(err.kinds(), vec![ErrorKind::AggregationComputeError]);
}

#[tokio::test(flavor = "multi_thread")]
async fn results_do_not_depend_on_partition_width_or_worker_count() {
    init_test_tracing();

    let all = uniform_facts(1..=300, 3);
    let mut results = Vec::new();

    for (width, workers) in [(1, 4), (7, 2), (100, 1), (1000, 8)] {
        let store = MemoryAggregationStore::with_facts(all.clone());
        AggregationDispatcher::new(store.clone(), config(width, workers))
            .run()
            .await
            .unwrap();

        results.push(store.live_aggregates().await.unwrap());
    }

    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(results[0].len(), 300);
}

#[tokio::test(flavor = "multi_thread")]
async fn an_empty_domain_is_a_no_op_success() {
    init_test_tracing();

    let store = MemoryAggregationStore::new();

    let report = AggregationDispatcher::new(store.clone(), config(1000, 2))
        .run()
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.dispatched, 0);
    assert_eq!(report.promoted_rows, None);
    assert!(store.get_job_batches().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn a_new_run_replaces_the_live_table() {
    init_test_tracing();

    let store = MemoryAggregationStore::with_facts(uniform_facts(1..=20, 1));
    let dispatcher = AggregationDispatcher::new(store.clone(), config(5, 2));
    dispatcher.run().await.unwrap();

    store.insert_facts(facts(&[(21, "4.0"), (1, "5.0")])).await;
    let report = dispatcher.run().await.unwrap();

    assert_eq!(report.promoted_rows, Some(21));
    // Staging was cleared by the new run, so nothing is promoted twice.
    assert_eq!(store.staged_aggregates().await.unwrap().len(), 21);
    let live = store.get_live_aggregates(&[1, 21]).await.unwrap();
    assert_eq!(live[&1].count, 2);
    assert_eq!(live[&1].metric_value, decimal("3.00000"));
    assert_eq!(live[&21].metric_value, decimal("4.00000"));
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_failed_only_dispatches_failed_and_stuck_batches() {
    init_test_tracing();

    let memory = MemoryAggregationStore::with_facts(uniform_facts(1..=30, 1));
    let faulty = FaultyAggregationStore::new(memory.clone()).fail_commit_for(2);

    let report = AggregationDispatcher::new(faulty, config(10, 2))
        .run()
        .await
        .unwrap();
    assert_eq!(report.completed, vec![1, 3]);
    assert_eq!(report.promoted_rows, Some(20));

    // Simulate a worker that crashed after claiming batch 3.
    memory
        .update_job_batch_status(3, JobStatus::Processing)
        .await
        .unwrap();

    let report = AggregationDispatcher::new(memory.clone(), config(10, 2))
        .rerun_failed()
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.completed, vec![2, 3]);

    let batches = memory.get_job_batches().await.unwrap();
    assert!(batches.iter().all(|batch| batch.status == JobStatus::Complete));
    assert_eq!(memory.staged_aggregates().await.unwrap().len(), 30);
    assert_eq!(memory.live_aggregates().await.unwrap().len(), 30);
}

#[tokio::test(flavor = "multi_thread")]
async fn an_unreadable_key_domain_fails_partitioning() {
    init_test_tracing();

    let store = FaultyAggregationStore::new(MemoryAggregationStore::with_facts(facts(&[(1, "1.0")])))
        .fail_key_domain();

    let err = AggregationDispatcher::new(store.clone(), config(10, 1))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PartitionError);
    assert!(store.inner().get_job_batches().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn a_failed_promotion_leaves_the_live_table_untouched() {
    init_test_tracing();

    let memory = MemoryAggregationStore::with_facts(uniform_facts(1..=10, 1));
    AggregationDispatcher::new(memory.clone(), config(5, 1))
        .run()
        .await
        .unwrap();
    let before = memory.live_aggregates().await.unwrap();

    memory.insert_facts(uniform_facts(11..=15, 1)).await;
    let faulty = FaultyAggregationStore::new(memory.clone()).fail_promotion();
    let err = AggregationDispatcher::new(faulty, config(5, 1))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PromotionError);
    assert_eq!(memory.live_aggregates().await.unwrap(), before);
    assert_eq!(memory.staged_aggregates().await.unwrap().len(), 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_either_the_previous_or_the_new_live_table() {
    init_test_tracing();

    let store = MemoryAggregationStore::with_facts(uniform_facts(1..=500, 2));
    let dispatcher = AggregationDispatcher::new(store.clone(), config(50, 4));
    dispatcher.run().await.unwrap();
    let previous = store.live_aggregates().await.unwrap();

    // Changes existing groups and adds new ones, so a mixed table is distinguishable.
    store.insert_facts(facts(&[(1, "5.0"), (250, "5.0")])).await;
    store.insert_facts(uniform_facts(501..=1000, 1)).await;

    let promoted = Arc::new(AtomicBool::new(false));
    let reader = tokio::spawn({
        let store = store.clone();
        let promoted = promoted.clone();
        async move {
            let mut observed: Vec<Vec<AggregateRow>> = Vec::new();
            loop {
                let finished = promoted.load(Ordering::Acquire);
                let live = store.live_aggregates().await.unwrap();
                if observed.last() != Some(&live) {
                    observed.push(live);
                }
                if finished {
                    return observed;
                }
                tokio::task::yield_now().await;
            }
        }
    });

    let report = dispatcher.run().await.unwrap();
    promoted.store(true, Ordering::Release);
    let observed = reader.await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.promoted_rows, Some(1000));

    let current = store.live_aggregates().await.unwrap();
    assert_ne!(previous, current);
    assert!(
        observed
            .iter()
            .all(|live| *live == previous || *live == current)
    );
    assert_eq!(observed.last(), Some(&current));
}
