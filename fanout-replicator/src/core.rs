use anyhow::{Context, bail};
use fanout::aggregation::{AggregationDispatcher, AggregationRunReport};
use fanout::audit::{AggregateAuditor, AuditReader, AuditReport, RecordAuditor};
use fanout::replication::ReplicationConductor;
use fanout::sink::Sink;
use fanout::sink::memory::MemorySink;
use fanout::source::Source;
use fanout::types::{MovieRecord, RatingRecord, Record};
use fanout_config::shared::{
    FANOUT_SINK_OPTIONS, FANOUT_STORE_OPTIONS, PgConnectionConfig, ReplicationConfig,
    ReplicatorConfig, SinkConfig,
};
use fanout_mysql::pool::create_mysql_pool;
use fanout_mysql::source::{MySqlMovieSource, MySqlRatingSource};
use fanout_neo4j::constraints::apply_constraints;
use fanout_neo4j::graph::connect_graph;
use fanout_neo4j::sink::{Neo4jMovieSink, Neo4jRatingSink};
use fanout_postgres::lock::{RunKind, RunLock};
use fanout_postgres::migrations::apply_migrations;
use fanout_postgres::pool::create_pg_pool;
use fanout_postgres::sink::{PostgresMovieSink, PostgresRatingSink};
use fanout_postgres::store::PostgresAggregationStore;
use neo4rs::Graph;
use sqlx::PgPool;
use std::collections::HashSet;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::Pipeline;

/// Name the source is reported under in logs and audit reports.
const SOURCE_NAME: &str = "mysql";

/// Connections per Postgres sink pool. Each sink is written by a single replication loop.
const SINK_POOL_CONNECTIONS: u32 = 2;

/// Connections per graph sink.
const GRAPH_CONNECTIONS: usize = 2;

/// Connections of the store pool on top of one per aggregation worker, for the dispatcher
/// and the run lock.
const STORE_POOL_EXTRA_CONNECTIONS: u32 = 2;

/// Applies the schema migrations to the store and to every distinct Postgres sink, and the
/// uniqueness constraints to every graph sink.
pub async fn apply_all_migrations(config: &ReplicatorConfig) -> anyhow::Result<()> {
    let mut databases: Vec<&PgConnectionConfig> = vec![&config.store];
    for sink in &config.sinks {
        match sink {
            SinkConfig::Postgres { connection, .. } => databases.push(connection),
            SinkConfig::Neo4j { name, connection } => {
                let graph = connect_graph(connection, 1).await?;
                apply_constraints(&graph)
                    .await
                    .with_context(|| format!("failed to apply the constraints of sink {name}"))?;
            }
            SinkConfig::Memory { .. } => {}
        }
    }

    let mut migrated = HashSet::new();
    for database in databases {
        let id = (database.host.as_str(), database.port, database.name.as_str());
        if !migrated.insert(id) {
            continue;
        }

        apply_migrations(database).await.with_context(|| {
            format!(
                "failed to migrate database {} on {}:{}",
                database.name, database.host, database.port
            )
        })?;
    }

    Ok(())
}

/// Brings every configured sink up to date with the source for `pipeline`.
pub async fn replicate(config: &ReplicatorConfig, pipeline: Pipeline) -> anyhow::Result<()> {
    let store_pool = create_pg_pool(&config.store, &FANOUT_STORE_OPTIONS, 1);
    let source_pool = create_mysql_pool(&config.source, config.sinks.len() as u32);

    match pipeline {
        Pipeline::Movies => {
            let source = MySqlMovieSource::new(SOURCE_NAME, source_pool);
            let sinks = build_sinks(
                config,
                |name, pool| {
                    Arc::new(PostgresMovieSink::new(name, pool)) as Arc<dyn Sink<MovieRecord>>
                },
                |name, graph| {
                    Arc::new(Neo4jMovieSink::new(name, graph)) as Arc<dyn Sink<MovieRecord>>
                },
            )
            .await?;
            with_run_lock(&store_pool, RunKind::MovieReplication, async {
                replicate_pipeline(source, sinks, config.replication.clone()).await
            })
            .await
        }
        Pipeline::Ratings => {
            let source = MySqlRatingSource::new(SOURCE_NAME, source_pool);
            let sinks = build_sinks(
                config,
                |name, pool| {
                    Arc::new(PostgresRatingSink::new(name, pool)) as Arc<dyn Sink<RatingRecord>>
                },
                |name, graph| {
                    Arc::new(Neo4jRatingSink::new(name, graph)) as Arc<dyn Sink<RatingRecord>>
                },
            )
            .await?;
            with_run_lock(&store_pool, RunKind::RatingReplication, async {
                replicate_pipeline(source, sinks, config.replication.clone()).await
            })
            .await
        }
    }
}

/// Recomputes the ratings summary from scratch and promotes it.
pub async fn aggregate(config: &ReplicatorConfig) -> anyhow::Result<()> {
    let (store_pool, dispatcher) = aggregation_dispatcher(config);

    with_run_lock(&store_pool, RunKind::Aggregation, async {
        let report = dispatcher.run().await?;
        log_aggregation_report(report)
    })
    .await
}

/// Re-runs the batches a previous aggregation left failed or stuck, then promotes.
pub async fn reset_failed(config: &ReplicatorConfig) -> anyhow::Result<()> {
    let (store_pool, dispatcher) = aggregation_dispatcher(config);

    with_run_lock(&store_pool, RunKind::Aggregation, async {
        let report = dispatcher.rerun_failed().await?;
        log_aggregation_report(report)
    })
    .await
}

/// Audits a sample of the movies in every Postgres and graph sink and a sample of the live
/// ratings summary.
///
/// Audits only read, so no run lock is taken.
pub async fn audit(config: &ReplicatorConfig) -> anyhow::Result<()> {
    let source_pool = create_mysql_pool(&config.source, 1);
    let source = Arc::new(MySqlMovieSource::new(SOURCE_NAME, source_pool));

    let mut targets: Vec<Arc<dyn AuditReader<MovieRecord>>> = Vec::new();
    for sink in &config.sinks {
        match sink {
            SinkConfig::Postgres { name, connection } => {
                let pool = create_pg_pool(connection, &FANOUT_SINK_OPTIONS, 1);
                targets.push(Arc::new(PostgresMovieSink::new(name.clone(), pool)));
            }
            SinkConfig::Neo4j { name, connection } => {
                let graph = connect_graph(connection, 1).await?;
                targets.push(Arc::new(Neo4jMovieSink::new(name.clone(), graph)));
            }
            SinkConfig::Memory { name } => {
                warn!(sink = %name, "memory sinks do not outlive a run, skipping its audit");
            }
        }
    }

    let movies_report = RecordAuditor::new(source, targets, config.audit.clone())
        .run()
        .await?;
    log_audit_report("movies", &movies_report);

    let store_pool = create_pg_pool(&config.store, &FANOUT_STORE_OPTIONS, 1);
    let store = PostgresAggregationStore::new(store_pool);
    let aggregates_report = AggregateAuditor::new(store, config.audit.clone())
        .run()
        .await?;
    log_audit_report("ratings_summary", &aggregates_report);

    let mismatches = movies_report.mismatches.len() + aggregates_report.mismatches.len();
    if mismatches > 0 {
        bail!("audit found {mismatches} mismatches");
    }

    Ok(())
}

/// Runs `run` while holding the advisory lock of `kind` and releases the lock afterwards,
/// whatever the outcome of the run.
async fn with_run_lock<F>(
    store_pool: &PgPool,
    kind: RunKind,
    run: F,
) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let lock = RunLock::acquire(store_pool, kind)
        .await
        .with_context(|| format!("could not start the {} run", kind.as_static_str()))?;

    let result = run.await;

    if let Err(err) = lock.release().await {
        warn!(error = %err, run = kind.as_static_str(), "failed to release the run lock");
    }

    result
}

/// Builds the sinks of one pipeline, using `postgres_sink` for the Postgres ones and
/// `graph_sink` for the graph ones.
///
/// Graph sinks connect while being built, so an unreachable graph fails the run before any
/// sink starts.
async fn build_sinks<R, P, G>(
    config: &ReplicatorConfig,
    postgres_sink: P,
    graph_sink: G,
) -> anyhow::Result<Vec<Arc<dyn Sink<R>>>>
where
    R: Record,
    P: Fn(String, PgPool) -> Arc<dyn Sink<R>>,
    G: Fn(String, Graph) -> Arc<dyn Sink<R>>,
{
    let mut sinks = Vec::with_capacity(config.sinks.len());
    for sink in &config.sinks {
        let sink = match sink {
            SinkConfig::Memory { name } => {
                warn!(sink = %name, "replicating into a memory sink, records are dropped on exit");
                Arc::new(MemorySink::<R>::new(name.clone())) as Arc<dyn Sink<R>>
            }
            SinkConfig::Postgres { name, connection } => {
                let pool = create_pg_pool(connection, &FANOUT_SINK_OPTIONS, SINK_POOL_CONNECTIONS);
                postgres_sink(name.clone(), pool)
            }
            SinkConfig::Neo4j { name, connection } => {
                let graph = connect_graph(connection, GRAPH_CONNECTIONS)
                    .await
                    .with_context(|| format!("failed to connect sink {name}"))?;
                graph_sink(name.clone(), graph)
            }
        };
        sinks.push(sink);
    }

    Ok(sinks)
}

async fn replicate_pipeline<R, S>(
    source: S,
    sinks: Vec<Arc<dyn Sink<R>>>,
    config: ReplicationConfig,
) -> anyhow::Result<()>
where
    R: Record,
    R::Position: Debug,
    S: Source<R> + Send + Sync + 'static,
{
    let report = ReplicationConductor::new(source, sinks, config).run().await;

    for (sink, progress) in report.succeeded() {
        info!(
            sink,
            start_position = ?progress.start_position,
            final_position = ?progress.final_position,
            batches = progress.batches_applied,
            records = progress.records_applied,
            "sink is up to date"
        );
    }
    for (sink, err) in report.failed() {
        error!(sink, error = %err, "sink failed to replicate");
    }

    report
        .into_result()
        .context("replication did not complete for every sink")?;

    Ok(())
}

fn aggregation_dispatcher(
    config: &ReplicatorConfig,
) -> (
    PgPool,
    AggregationDispatcher<PostgresAggregationStore>,
) {
    let connections = config.aggregation.worker_count() as u32 + STORE_POOL_EXTRA_CONNECTIONS;
    let store_pool = create_pg_pool(&config.store, &FANOUT_STORE_OPTIONS, connections);
    let store = PostgresAggregationStore::new(store_pool.clone());

    (
        store_pool,
        AggregationDispatcher::new(store, config.aggregation.clone()),
    )
}

fn log_aggregation_report(report: AggregationRunReport) -> anyhow::Result<()> {
    info!(
        dispatched = report.dispatched,
        completed = report.completed.len(),
        failed = report.failed.len(),
        promoted_rows = ?report.promoted_rows,
        "aggregation run finished"
    );
    for (batch_id, err) in &report.failed {
        error!(batch_id, error = %err, "aggregation batch failed");
    }

    match report.into_result().context("aggregation did not complete")? {
        Some(rows) => info!(rows, "ratings summary promoted"),
        None => info!("no pending batches, ratings summary left untouched"),
    }

    Ok(())
}

fn log_audit_report<K: Debug>(audit: &str, report: &AuditReport<K>) {
    if report.is_consistent() {
        info!(audit, sampled = report.sampled, "audit found no mismatches");
        return;
    }

    for mismatch in &report.mismatches {
        warn!(audit, target = mismatch.target(), mismatch = ?mismatch, "audit mismatch");
    }
    error!(
        audit,
        sampled = report.sampled,
        mismatches = report.mismatches.len(),
        "audit found mismatches"
    );
}
