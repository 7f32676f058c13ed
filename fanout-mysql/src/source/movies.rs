use async_trait::async_trait;
use fanout::audit::{AuditReader, AuditSource};
use fanout::error::FanoutResult;
use fanout::source::Source;
use fanout::types::{MovieRecord, RecordBatch};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::collections::BTreeMap;
use tracing::debug;

use crate::source::{limit, source_error};

/// Reads the `movies` table in `movieId` order.
///
/// Every read is a single keyset query, so concurrent reads from different positions share
/// nothing but the pool.
#[derive(Debug, Clone)]
pub struct MySqlMovieSource {
    name: String,
    pool: MySqlPool,
}

impl MySqlMovieSource {
    pub fn new(name: impl Into<String>, pool: MySqlPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }
}

impl Source<MovieRecord> for MySqlMovieSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_batch(
        &self,
        limit_records: usize,
        after_position: &i64,
    ) -> FanoutResult<RecordBatch<MovieRecord>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            select cast(movieId as signed), title, genres
            from movies
            where movieId > ?
            order by movieId
            limit ?
            "#,
        )
        .bind(*after_position)
        .bind(limit(limit_records))
        .fetch_all(&self.pool)
        .await
        .map_err(source_error)?;

        debug!(
            source = %self.name,
            after = after_position,
            records = rows.len(),
            "read movies batch"
        );

        RecordBatch::new(
            rows.into_iter()
                .map(|(movie_id, title, genres)| MovieRecord::new(movie_id, title, genres))
                .collect(),
        )
    }
}

#[async_trait]
impl AuditReader<MovieRecord> for MySqlMovieSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_records(&self, keys: &[i64]) -> FanoutResult<BTreeMap<i64, MovieRecord>> {
        if keys.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
            "select cast(movieId as signed), title, genres from movies where movieId in (",
        );
        let mut separated = builder.separated(", ");
        for key in keys {
            separated.push_bind(*key);
        }
        separated.push_unseparated(")");

        let rows: Vec<(i64, String, String)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(source_error)?;

        Ok(rows
            .into_iter()
            .map(|(movie_id, title, genres)| (movie_id, MovieRecord::new(movie_id, title, genres)))
            .collect())
    }
}

#[async_trait]
impl AuditSource<MovieRecord> for MySqlMovieSource {
    async fn all_keys(&self) -> FanoutResult<Vec<i64>> {
        sqlx::query_scalar("select cast(movieId as signed) from movies order by movieId")
            .fetch_all(&self.pool)
            .await
            .map_err(source_error)
    }
}
