#![cfg(feature = "test-utils")]

use fanout::audit::{AuditReader, RecordAuditor};
use fanout::sink::Sink;
use fanout::source::memory::MemorySource;
use fanout::test_utils::fixtures::{decimal, movie_batch, movies, ratings};
use fanout::types::{MovieRecord, RatingRecord, RecordBatch};
use fanout_config::shared::AuditConfig;
use fanout_neo4j::sink::{Neo4jMovieSink, Neo4jRatingSink};
use fanout_neo4j::test_utils::{clear_graph, connect_test_graph, test_neo4j_config};
use fanout_telemetry::tracing::init_test_tracing;
use neo4rs::{Graph, query};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

async fn count(graph: &Graph, statement: &str) -> i64 {
    let mut rows = graph.execute(query(statement)).await.unwrap();
    let row = rows.next().await.unwrap().unwrap();

    row.get::<i64>("count").unwrap()
}

// The sinks share the single database of the test server, so the whole flow runs in one test.
#[tokio::test(flavor = "multi_thread")]
async fn graph_sinks_merge_resume_and_audit() {
    init_test_tracing();

    let graph = connect_test_graph(&test_neo4j_config()).await;
    clear_graph(&graph).await;

    let movie_sink = Neo4jMovieSink::new("neo4j", graph.clone());
    let rating_sink = Neo4jRatingSink::new("neo4j", graph.clone());

    assert_eq!(movie_sink.current_position().await.unwrap(), 0);
    assert_eq!(rating_sink.current_position().await.unwrap(), (0, 0));

    // Applying a batch twice merges rather than duplicates.
    movie_sink.apply_batch(&movie_batch(1..=5)).await.unwrap();
    movie_sink.apply_batch(&movie_batch(1..=5)).await.unwrap();
    assert_eq!(count(&graph, "match (m:Movie) return count(m) as count").await, 5);

    // Re-applied movies lose genres they no longer have.
    movie_sink
        .apply_batch(
            &RecordBatch::new(vec![MovieRecord::new(6, "Heat (1995)", "Action|Crime|Thriller\r")])
                .unwrap(),
        )
        .await
        .unwrap();
    movie_sink
        .apply_batch(&RecordBatch::new(vec![MovieRecord::new(6, "Heat (1995)", "Crime")]).unwrap())
        .await
        .unwrap();
    let records = movie_sink.read_records(&[6, 42]).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[&6].genre_list(), vec!["Crime"]);

    let reopened = Neo4jMovieSink::new("neo4j", graph.clone());
    assert_eq!(reopened.current_position().await.unwrap(), 6);

    // Ratings attach to existing movies, the one for movie 42 is skipped.
    let mut all = ratings(1..=2, 1..=3);
    all.push(RatingRecord {
        user_id: 3,
        movie_id: 1,
        rating: decimal("4.5"),
        timestamp: 1_700_000_000,
    });
    all.push(RatingRecord {
        user_id: 3,
        movie_id: 42,
        rating: decimal("3.0"),
        timestamp: 1_700_000_001,
    });
    let batch = RecordBatch::new(all).unwrap();
    rating_sink.apply_batch(&batch).await.unwrap();
    rating_sink.apply_batch(&batch).await.unwrap();

    assert_eq!(rating_sink.current_position().await.unwrap(), (3, 1));
    assert_eq!(
        count(&graph, "match (:User)-[r:RATED]->(:Movie) return count(r) as count").await,
        7
    );

    // The graph audits clean against a source holding the same movies.
    let mut source_movies = movies(1..=5);
    source_movies.push(MovieRecord::new(6, "Heat (1995)", "Crime"));
    let source = Arc::new(MemorySource::with_records("source", source_movies));
    let auditor = RecordAuditor::new(
        source,
        vec![Arc::new(reopened) as Arc<dyn AuditReader<MovieRecord>>],
        AuditConfig {
            sample_fraction: 1.0,
            min_sample_size: 1,
        },
    );
    let report = auditor
        .run_with_rng(&mut StdRng::seed_from_u64(7))
        .await
        .unwrap();

    assert_eq!(report.sampled, 6);
    assert!(report.is_consistent());

    clear_graph(&graph).await;
}
