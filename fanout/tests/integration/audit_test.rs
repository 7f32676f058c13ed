use fanout::aggregation::AggregationDispatcher;
use fanout::audit::{AggregateAuditor, AuditReader, Mismatch, RecordAuditor};
use fanout::replication::ReplicationConductor;
use fanout::sink::Sink;
use fanout::sink::memory::MemorySink;
use fanout::source::memory::MemorySource;
use fanout::store::memory::MemoryAggregationStore;
use fanout::test_utils::fixtures::{facts, movies, uniform_facts};
use fanout::types::{MovieRecord, RecordBatch};
use fanout_config::shared::{AggregationConfig, AuditConfig, ReplicationConfig};
use fanout_telemetry::tracing::init_test_tracing;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

fn full_sample() -> AuditConfig {
    AuditConfig {
        sample_fraction: 1.0,
        min_sample_size: 1,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn replicated_sinks_pass_the_record_audit_until_they_drift() {
    init_test_tracing();

    let source = MemorySource::with_records("mysql", movies(1..=50));
    let postgres = MemorySink::new("postgres");
    let graph = MemorySink::new("graph");

    ReplicationConductor::new(
        source.clone(),
        vec![
            Arc::new(postgres.clone()) as Arc<dyn Sink<MovieRecord>>,
            Arc::new(graph.clone()),
        ],
        ReplicationConfig::default(),
    )
    .run()
    .await
    .into_result()
    .unwrap();

    let auditor = RecordAuditor::new(
        Arc::new(source.clone()),
        vec![
            Arc::new(postgres.clone()) as Arc<dyn AuditReader<MovieRecord>>,
            Arc::new(graph.clone()),
        ],
        full_sample(),
    );
    let report = auditor.run().await.unwrap();
    assert_eq!(report.sampled, 50);
    assert!(report.is_consistent());

    // The source is edited after replication, which only a later run would carry over.
    source
        .insert(MovieRecord::new(7, "Renamed", "Drama"))
        .await;
    graph.clear().await;
    graph
        .apply_batch(&RecordBatch::new(movies(1..=40)).unwrap())
        .await
        .unwrap();

    let report = auditor.run().await.unwrap();

    assert!(!report.is_consistent());
    let postgres_mismatches: Vec<_> = report.mismatches_in("postgres").collect();
    assert_eq!(postgres_mismatches.len(), 1);
    assert!(matches!(postgres_mismatches[0], Mismatch::Differs { key: 7, .. }));

    let graph_mismatches: Vec<_> = report.mismatches_in("graph").collect();
    assert_eq!(graph_mismatches.len(), 11);
    assert!(
        graph_mismatches[1..]
            .iter()
            .all(|mismatch| matches!(mismatch, Mismatch::Missing { .. }))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn sampling_respects_the_configured_fraction() {
    init_test_tracing();

    let source = MemorySource::with_records("mysql", movies(1..=1000));
    let sink = MemorySink::new("postgres");

    let auditor = RecordAuditor::new(
        Arc::new(source),
        vec![Arc::new(sink) as Arc<dyn AuditReader<MovieRecord>>],
        AuditConfig {
            sample_fraction: 0.05,
            min_sample_size: 1,
        },
    );
    let report = auditor
        .run_with_rng(&mut StdRng::seed_from_u64(42))
        .await
        .unwrap();

    assert_eq!(report.sampled, 50);
    assert_eq!(report.mismatches.len(), 50);
}

#[tokio::test(flavor = "multi_thread")]
async fn promoted_aggregates_pass_the_aggregate_audit_until_facts_change() {
    init_test_tracing();

    let store = MemoryAggregationStore::with_facts(uniform_facts(1..=100, 4));
    AggregationDispatcher::new(
        store.clone(),
        AggregationConfig {
            partition_width: 25,
            max_workers: Some(4),
        },
    )
    .run()
    .await
    .unwrap();

    let auditor = AggregateAuditor::new(store.clone(), full_sample());
    let report = auditor.run().await.unwrap();
    assert_eq!(report.sampled, 100);
    assert!(report.is_consistent());

    store.insert_facts(facts(&[(10, "5.0"), (101, "3.0")])).await;

    let report = auditor.run().await.unwrap();

    assert_eq!(report.sampled, 101);
    assert_eq!(report.mismatches.len(), 2);
    assert!(matches!(report.mismatches[0], Mismatch::Differs { key: 10, .. }));
    assert!(matches!(report.mismatches[1], Mismatch::Missing { key: 101, .. }));
}
