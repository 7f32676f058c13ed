use async_trait::async_trait;
use fanout::audit::AuditReader;
use fanout::error::FanoutResult;
use fanout::sink::Sink;
use fanout::types::{MovieRecord, RecordBatch};
use neo4rs::{Graph, query};
use std::collections::BTreeMap;
use tracing::debug;

use crate::graph::decode_error;
use crate::sink::{apply_error, query_error};

/// Upserts a batch in one statement, so a batch is either fully applied or not at all.
///
/// Genre edges of a re-applied movie are replaced rather than added to, so a movie whose
/// genres changed in the source loses the ones it no longer has.
const UPSERT_MOVIES: &str = "
unwind range(0, size($movie_ids) - 1) as i
merge (m:Movie {movieId: $movie_ids[i]})
set m.title = $titles[i]
with m, $genres[i] as genres
optional match (m)-[stale:IN_GENRE]->(:Genre)
delete stale
with distinct m, genres
foreach (genre_name in genres |
    merge (g:Genre {name: genre_name})
    merge (m)-[:IN_GENRE]->(g))
";

const MAX_MOVIE_ID: &str = "match (m:Movie) return coalesce(max(m.movieId), 0) as position";

const MOVIES_BY_ID: &str = "
match (m:Movie) where m.movieId in $movie_ids
optional match (m)-[:IN_GENRE]->(g:Genre)
return m.movieId as movie_id, m.title as title, collect(g.name) as genres
";

/// Merges movies as `Movie` nodes linked to one `Genre` node per genre by `IN_GENRE` edges.
///
/// The resume position is the greatest `movieId` in the graph.
#[derive(Clone)]
pub struct Neo4jMovieSink {
    name: String,
    graph: Graph,
}

impl Neo4jMovieSink {
    pub fn new(name: impl Into<String>, graph: Graph) -> Self {
        Self {
            name: name.into(),
            graph,
        }
    }
}

#[async_trait]
impl Sink<MovieRecord> for Neo4jMovieSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_position(&self) -> FanoutResult<i64> {
        let mut rows = self
            .graph
            .execute(query(MAX_MOVIE_ID))
            .await
            .map_err(query_error)?;

        match rows.next().await.map_err(query_error)? {
            Some(row) => row.get::<i64>("position").map_err(decode_error),
            None => Ok(0),
        }
    }

    async fn apply_batch(&self, batch: &RecordBatch<MovieRecord>) -> FanoutResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let records = batch.records();
        let movie_ids: Vec<i64> = records.iter().map(|movie| movie.movie_id).collect();
        let titles: Vec<String> = records.iter().map(|movie| movie.title.clone()).collect();
        let genres: Vec<Vec<String>> = records.iter().map(MovieRecord::genre_list).collect();

        self.graph
            .run(
                query(UPSERT_MOVIES)
                    .param("movie_ids", movie_ids)
                    .param("titles", titles)
                    .param("genres", genres),
            )
            .await
            .map_err(apply_error)?;

        debug!(sink = %self.name, records = batch.len(), "merged movies");

        Ok(())
    }
}

#[async_trait]
impl AuditReader<MovieRecord> for Neo4jMovieSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_records(&self, keys: &[i64]) -> FanoutResult<BTreeMap<i64, MovieRecord>> {
        let mut rows = self
            .graph
            .execute(query(MOVIES_BY_ID).param("movie_ids", keys.to_vec()))
            .await
            .map_err(query_error)?;

        let mut records = BTreeMap::new();
        while let Some(row) = rows.next().await.map_err(query_error)? {
            let movie_id: i64 = row.get("movie_id").map_err(decode_error)?;
            let title: String = row.get("title").map_err(decode_error)?;
            let genres: Vec<String> = row.get("genres").map_err(decode_error)?;

            records.insert(movie_id, MovieRecord::new(movie_id, title, genres.join("|")));
        }

        Ok(records)
    }
}
