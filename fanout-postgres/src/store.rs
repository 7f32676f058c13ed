use bigdecimal::BigDecimal;
use fanout::bail;
use fanout::error::{ErrorKind, FanoutResult};
use fanout::store::{AggregateStore, FactStore, JobStore};
use fanout::types::{AggregateRow, JobBatch, JobBatchId, JobStatus, KeyRange, RawFact};
use sqlx::PgPool;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Database enum type for job batch status.
///
/// Maps to the `jobs.batch_status` Postgres enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "jobs.batch_status", rename_all = "snake_case")]
enum BatchStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl From<JobStatus> for BatchStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => BatchStatus::Pending,
            JobStatus::Processing => BatchStatus::Processing,
            JobStatus::Complete => BatchStatus::Complete,
            JobStatus::Failed => BatchStatus::Failed,
        }
    }
}

impl From<BatchStatus> for JobStatus {
    fn from(status: BatchStatus) -> Self {
        match status {
            BatchStatus::Pending => JobStatus::Pending,
            BatchStatus::Processing => JobStatus::Processing,
            BatchStatus::Complete => JobStatus::Complete,
            BatchStatus::Failed => JobStatus::Failed,
        }
    }
}

/// Database row of `jobs.aggregation_batches`.
#[derive(Debug, sqlx::FromRow)]
struct JobBatchRow {
    batch_id: i64,
    start_movie_id: i64,
    end_movie_id: i64,
    status: BatchStatus,
    last_error: Option<String>,
}

impl From<JobBatchRow> for JobBatch {
    fn from(row: JobBatchRow) -> Self {
        JobBatch {
            batch_id: row.batch_id,
            start_key: row.start_movie_id,
            end_key: row.end_movie_id,
            status: row.status.into(),
            last_error: row.last_error,
        }
    }
}

fn aggregate_row((group_key, metric_value, count): (i64, BigDecimal, i64)) -> AggregateRow {
    AggregateRow {
        group_key,
        metric_value,
        count,
    }
}

/// Job batches, raw facts and aggregates kept in Postgres.
///
/// Raw facts are the ratings in `movies.ratings`, grouped by `movie_id`, and the key domain
/// spans `movies.movies`. Aggregates are staged in `movies.ratings_summary_staging` and
/// promoted into `movies.ratings_summary`.
#[derive(Debug, Clone)]
pub struct PostgresAggregationStore {
    pool: PgPool,
}

impl PostgresAggregationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl JobStore for PostgresAggregationStore {
    async fn recreate_job_batches(&self, ranges: Vec<KeyRange>) -> FanoutResult<Vec<JobBatch>> {
        let start_keys: Vec<i64> = ranges.iter().map(|range| range.start_key).collect();
        let end_keys: Vec<i64> = ranges.iter().map(|range| range.end_key).collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query("truncate jobs.aggregation_batches restart identity")
            .execute(&mut *tx)
            .await?;
        sqlx::query("truncate movies.ratings_summary_staging")
            .execute(&mut *tx)
            .await?;

        let rows: Vec<JobBatchRow> = sqlx::query_as(
            r#"
            insert into jobs.aggregation_batches (start_movie_id, end_movie_id)
            select start_key, end_key
            from unnest($1::bigint[], $2::bigint[]) with ordinality as r(start_key, end_key, ord)
            order by ord
            returning batch_id, start_movie_id, end_movie_id, status, last_error
            "#,
        )
        .bind(&start_keys)
        .bind(&end_keys)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut batches: Vec<JobBatch> = rows.into_iter().map(Into::into).collect();
        batches.sort_by_key(|batch| batch.batch_id);

        info!(batches = batches.len(), "recreated job batches");

        Ok(batches)
    }

    async fn get_job_batch(&self, batch_id: JobBatchId) -> FanoutResult<Option<JobBatch>> {
        let row: Option<JobBatchRow> = sqlx::query_as(
            r#"
            select batch_id, start_movie_id, end_movie_id, status, last_error
            from jobs.aggregation_batches
            where batch_id = $1
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_job_batches(&self) -> FanoutResult<Vec<JobBatch>> {
        let rows: Vec<JobBatchRow> = sqlx::query_as(
            r#"
            select batch_id, start_movie_id, end_movie_id, status, last_error
            from jobs.aggregation_batches
            order by batch_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_job_batches_by_status(&self, status: JobStatus) -> FanoutResult<Vec<JobBatch>> {
        let rows: Vec<JobBatchRow> = sqlx::query_as(
            r#"
            select batch_id, start_movie_id, end_movie_id, status, last_error
            from jobs.aggregation_batches
            where status = $1
            order by batch_id
            "#,
        )
        .bind(BatchStatus::from(status))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_job_batch_status(
        &self,
        batch_id: JobBatchId,
        status: JobStatus,
    ) -> FanoutResult<()> {
        let result = sqlx::query(
            r#"
            update jobs.aggregation_batches
            set status = $2, updated_at = now()
            where batch_id = $1
            "#,
        )
        .bind(batch_id)
        .bind(BatchStatus::from(status))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!(
                ErrorKind::InvalidState,
                "Job batch does not exist",
                format!("no job batch with id {batch_id}")
            );
        }

        debug!(batch_id, status = %status, "updated job batch status");

        Ok(())
    }

    async fn fail_job_batch(&self, batch_id: JobBatchId, reason: String) -> FanoutResult<()> {
        let result = sqlx::query(
            r#"
            update jobs.aggregation_batches
            set status = 'failed', last_error = $2, updated_at = now()
            where batch_id = $1
            "#,
        )
        .bind(batch_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!(
                ErrorKind::InvalidState,
                "Job batch does not exist",
                format!("no job batch with id {batch_id}")
            );
        }

        Ok(())
    }

    async fn reset_job_batches(&self, statuses: &[JobStatus]) -> FanoutResult<u64> {
        let statuses: Vec<&str> = statuses.iter().map(|status| status.as_static_str()).collect();

        let result = sqlx::query(
            r#"
            update jobs.aggregation_batches
            set status = 'pending', last_error = null, updated_at = now()
            where status::text = any($1)
            "#,
        )
        .bind(&statuses)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

impl FactStore for PostgresAggregationStore {
    async fn fact_key_domain(&self) -> FanoutResult<Option<KeyRange>> {
        let (min, max): (Option<i64>, Option<i64>) =
            sqlx::query_as("select min(movie_id), max(movie_id) from movies.movies")
                .fetch_one(&self.pool)
                .await?;

        Ok(min.zip(max).map(|(min, max)| KeyRange::new(min, max)))
    }

    async fn read_facts(&self, range: KeyRange) -> FanoutResult<Vec<RawFact>> {
        let rows: Vec<(i64, Option<BigDecimal>)> = sqlx::query_as(
            "select movie_id, rating from movies.ratings where movie_id between $1 and $2",
        )
        .bind(range.start_key)
        .bind(range.end_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(movie_id, rating)| RawFact::new(movie_id, rating))
            .collect())
    }

    async fn fact_group_keys(&self) -> FanoutResult<Vec<i64>> {
        let keys = sqlx::query_scalar("select distinct movie_id from movies.ratings order by movie_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(keys)
    }
}

impl AggregateStore for PostgresAggregationStore {
    async fn commit_batch_aggregates(
        &self,
        batch_id: JobBatchId,
        rows: Vec<AggregateRow>,
    ) -> FanoutResult<()> {
        let mut tx = self.pool.begin().await?;

        let range: Option<(i64, i64)> = sqlx::query_as(
            r#"
            select start_movie_id, end_movie_id
            from jobs.aggregation_batches
            where batch_id = $1
            for update
            "#,
        )
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((start_key, end_key)) = range else {
            bail!(
                ErrorKind::InvalidState,
                "Job batch does not exist",
                format!("no job batch with id {batch_id}")
            );
        };

        sqlx::query("delete from movies.ratings_summary_staging where movie_id between $1 and $2")
            .bind(start_key)
            .bind(end_key)
            .execute(&mut *tx)
            .await?;

        let group_keys: Vec<i64> = rows.iter().map(|row| row.group_key).collect();
        let metric_values: Vec<BigDecimal> = rows.iter().map(|row| row.metric_value.clone()).collect();
        let counts: Vec<i64> = rows.iter().map(|row| row.count).collect();

        sqlx::query(
            r#"
            insert into movies.ratings_summary_staging (movie_id, average_rating, rating_count)
            select * from unnest($1::bigint[], $2::numeric[], $3::bigint[])
            "#,
        )
        .bind(&group_keys)
        .bind(&metric_values)
        .bind(&counts)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            update jobs.aggregation_batches
            set status = 'complete', last_error = null, updated_at = now()
            where batch_id = $1
            "#,
        )
        .bind(batch_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn staged_aggregates(&self) -> FanoutResult<Vec<AggregateRow>> {
        let rows: Vec<(i64, BigDecimal, i64)> = sqlx::query_as(
            r#"
            select movie_id, average_rating, rating_count
            from movies.ratings_summary_staging
            order by movie_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(aggregate_row).collect())
    }

    async fn promote_staged_aggregates(&self) -> FanoutResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("truncate movies.ratings_summary")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(
            r#"
            insert into movies.ratings_summary (movie_id, average_rating, rating_count)
            select movie_id, average_rating, rating_count
            from movies.ratings_summary_staging
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn live_aggregates(&self) -> FanoutResult<Vec<AggregateRow>> {
        let rows: Vec<(i64, BigDecimal, i64)> = sqlx::query_as(
            r#"
            select movie_id, average_rating, rating_count
            from movies.ratings_summary
            order by movie_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(aggregate_row).collect())
    }

    async fn get_live_aggregates(
        &self,
        group_keys: &[i64],
    ) -> FanoutResult<BTreeMap<i64, AggregateRow>> {
        let rows: Vec<(i64, BigDecimal, i64)> = sqlx::query_as(
            r#"
            select movie_id, average_rating, rating_count
            from movies.ratings_summary
            where movie_id = any($1)
            "#,
        )
        .bind(group_keys)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.0, aggregate_row(row)))
            .collect())
    }
}
