use fanout::error::FanoutResult;
use fanout::source::Source;
use fanout::types::{RatingRecord, RecordBatch};
use sqlx::MySqlPool;
use tracing::debug;

use crate::source::{limit, source_error};

/// Reads the `ratings` table in `(userId, movieId)` order.
#[derive(Debug, Clone)]
pub struct MySqlRatingSource {
    name: String,
    pool: MySqlPool,
}

impl MySqlRatingSource {
    pub fn new(name: impl Into<String>, pool: MySqlPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }
}

impl Source<RatingRecord> for MySqlRatingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_batch(
        &self,
        limit_records: usize,
        after_position: &(i64, i64),
    ) -> FanoutResult<RecordBatch<RatingRecord>> {
        let (after_user_id, after_movie_id) = *after_position;

        let rows: Vec<(i64, i64, bigdecimal::BigDecimal, i64)> = sqlx::query_as(
            r#"
            select
                cast(userId as signed),
                cast(movieId as signed),
                cast(rating as decimal(10, 5)),
                cast(`timestamp` as signed)
            from ratings
            where (userId, movieId) > (?, ?)
            order by userId, movieId
            limit ?
            "#,
        )
        .bind(after_user_id)
        .bind(after_movie_id)
        .bind(limit(limit_records))
        .fetch_all(&self.pool)
        .await
        .map_err(source_error)?;

        debug!(
            source = %self.name,
            after = ?after_position,
            records = rows.len(),
            "read ratings batch"
        );

        RecordBatch::new(
            rows.into_iter()
                .map(|(user_id, movie_id, rating, timestamp)| RatingRecord {
                    user_id,
                    movie_id,
                    rating,
                    timestamp,
                })
                .collect(),
        )
    }
}
