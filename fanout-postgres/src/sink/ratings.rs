use async_trait::async_trait;
use fanout::error::FanoutResult;
use fanout::sink::Sink;
use fanout::types::{RatingRecord, RecordBatch};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::sink::{MAX_ROWS_PER_STATEMENT, apply_error, query_error};

/// Upserts ratings into `movies.ratings`, keyed by `(user_id, movie_id)`.
#[derive(Debug, Clone)]
pub struct PostgresRatingSink {
    name: String,
    pool: PgPool,
}

impl PostgresRatingSink {
    pub fn new(name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }
}

#[async_trait]
impl Sink<RatingRecord> for PostgresRatingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_position(&self) -> FanoutResult<(i64, i64)> {
        let last: Option<(i64, i64)> = sqlx::query_as(
            "select user_id, movie_id from movies.ratings order by user_id desc, movie_id desc limit 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(last.unwrap_or((0, 0)))
    }

    async fn apply_batch(&self, batch: &RecordBatch<RatingRecord>) -> FanoutResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(apply_error)?;

        for chunk in batch.records().chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("insert into movies.ratings (user_id, movie_id, rating, rated_at) ");
            builder.push_values(chunk, |mut row, rating| {
                row.push_bind(rating.user_id)
                    .push_bind(rating.movie_id)
                    .push_bind(&rating.rating)
                    .push_bind(rating.timestamp);
            });
            builder.push(
                " on conflict (user_id, movie_id) do update set rating = excluded.rating, rated_at = excluded.rated_at",
            );

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(apply_error)?;
        }

        tx.commit().await.map_err(apply_error)?;

        debug!(sink = %self.name, records = batch.len(), "upserted ratings");

        Ok(())
    }
}
