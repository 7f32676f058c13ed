use async_trait::async_trait;
use fanout::audit::AuditReader;
use fanout::error::FanoutResult;
use fanout::sink::Sink;
use fanout::types::{MovieRecord, RecordBatch};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use tracing::debug;

use crate::sink::{MAX_ROWS_PER_STATEMENT, apply_error, query_error};

/// Upserts movies into `movies.movies`, storing genres as a text array.
///
/// The resume position is the greatest stored `movie_id`, read from the table on every call.
#[derive(Debug, Clone)]
pub struct PostgresMovieSink {
    name: String,
    pool: PgPool,
}

impl PostgresMovieSink {
    pub fn new(name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }
}

#[async_trait]
impl Sink<MovieRecord> for PostgresMovieSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_position(&self) -> FanoutResult<i64> {
        let max_movie_id: Option<i64> =
            sqlx::query_scalar("select max(movie_id) from movies.movies")
                .fetch_one(&self.pool)
                .await
                .map_err(query_error)?;

        Ok(max_movie_id.unwrap_or(0))
    }

    async fn apply_batch(&self, batch: &RecordBatch<MovieRecord>) -> FanoutResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(apply_error)?;

        for chunk in batch.records().chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("insert into movies.movies (movie_id, title, genres) ");
            builder.push_values(chunk, |mut row, movie| {
                row.push_bind(movie.movie_id)
                    .push_bind(&movie.title)
                    .push_bind(movie.genre_list());
            });
            builder.push(
                " on conflict (movie_id) do update set title = excluded.title, genres = excluded.genres",
            );

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(apply_error)?;
        }

        tx.commit().await.map_err(apply_error)?;

        debug!(sink = %self.name, records = batch.len(), "upserted movies");

        Ok(())
    }
}

#[async_trait]
impl AuditReader<MovieRecord> for PostgresMovieSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_records(&self, keys: &[i64]) -> FanoutResult<BTreeMap<i64, MovieRecord>> {
        let rows: Vec<(i64, String, Vec<String>)> = sqlx::query_as(
            "select movie_id, title, genres from movies.movies where movie_id = any($1)",
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(rows
            .into_iter()
            .map(|(movie_id, title, genres)| {
                (movie_id, MovieRecord::new(movie_id, title, genres.join("|")))
            })
            .collect())
    }
}
