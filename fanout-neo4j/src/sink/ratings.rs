use async_trait::async_trait;
use bigdecimal::ToPrimitive;
use fanout::bail;
use fanout::error::{ErrorKind, FanoutResult};
use fanout::sink::Sink;
use fanout::types::{RatingRecord, RecordBatch};
use neo4rs::{Graph, query};
use tracing::{debug, warn};

use crate::graph::decode_error;
use crate::sink::{apply_error, query_error};

/// Ratings only attach to movies already in the graph, so the movie pipeline must run first.
const UPSERT_RATINGS: &str = "
unwind range(0, size($user_ids) - 1) as i
match (m:Movie {movieId: $movie_ids[i]})
merge (u:User {userId: $user_ids[i]})
merge (u)-[r:RATED]->(m)
set r.rating = $ratings[i], r.timestamp = $timestamps[i]
return count(r) as written
";

const LAST_RATING: &str = "
match (u:User)-[:RATED]->(m:Movie)
return u.userId as user_id, m.movieId as movie_id
order by user_id desc, movie_id desc
limit 1
";

/// Merges ratings as `RATED` edges from `User` nodes to `Movie` nodes, carrying the rating
/// and its timestamp.
///
/// The resume position is the greatest `(userId, movieId)` pair among the edges.
#[derive(Clone)]
pub struct Neo4jRatingSink {
    name: String,
    graph: Graph,
}

impl Neo4jRatingSink {
    pub fn new(name: impl Into<String>, graph: Graph) -> Self {
        Self {
            name: name.into(),
            graph,
        }
    }
}

/// Converts a rating to the float stored on the edge.
fn rating_value(rating: &RatingRecord) -> FanoutResult<f64> {
    match rating.rating.to_f64() {
        Some(value) if value.is_finite() => Ok(value),
        _ => bail!(
            ErrorKind::ApplyError,
            "Rating cannot be stored as a float",
            format!(
                "rating {} of user {} for movie {}",
                rating.rating, rating.user_id, rating.movie_id
            )
        ),
    }
}

#[async_trait]
impl Sink<RatingRecord> for Neo4jRatingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_position(&self) -> FanoutResult<(i64, i64)> {
        let mut rows = self
            .graph
            .execute(query(LAST_RATING))
            .await
            .map_err(query_error)?;

        let Some(row) = rows.next().await.map_err(query_error)? else {
            return Ok((0, 0));
        };

        let user_id: i64 = row.get("user_id").map_err(decode_error)?;
        let movie_id: i64 = row.get("movie_id").map_err(decode_error)?;

        Ok((user_id, movie_id))
    }

    async fn apply_batch(&self, batch: &RecordBatch<RatingRecord>) -> FanoutResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let records = batch.records();
        let user_ids: Vec<i64> = records.iter().map(|rating| rating.user_id).collect();
        let movie_ids: Vec<i64> = records.iter().map(|rating| rating.movie_id).collect();
        let timestamps: Vec<i64> = records.iter().map(|rating| rating.timestamp).collect();
        let ratings = records
            .iter()
            .map(rating_value)
            .collect::<FanoutResult<Vec<f64>>>()?;

        let mut rows = self
            .graph
            .execute(
                query(UPSERT_RATINGS)
                    .param("user_ids", user_ids)
                    .param("movie_ids", movie_ids)
                    .param("ratings", ratings)
                    .param("timestamps", timestamps),
            )
            .await
            .map_err(apply_error)?;

        let written = match rows.next().await.map_err(apply_error)? {
            Some(row) => row.get::<i64>("written").map_err(decode_error)?,
            None => 0,
        };

        if written < batch.len() as i64 {
            warn!(
                sink = %self.name,
                records = batch.len(),
                written,
                "skipped ratings of movies missing from the graph"
            );
        }

        debug!(sink = %self.name, records = batch.len(), "merged ratings");

        Ok(())
    }
}
