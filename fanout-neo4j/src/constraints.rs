use fanout::error::{ErrorKind, FanoutResult};
use neo4rs::{Graph, query};
use tracing::info;

use crate::graph::graph_error;

/// Uniqueness constraints backing the natural keys the sinks `MERGE` on. Each constraint also
/// creates the index that keeps those lookups from scanning every node of a label.
const CONSTRAINTS: [&str; 3] = [
    "create constraint movie_id_unique if not exists for (m:Movie) require m.movieId is unique",
    "create constraint genre_name_unique if not exists for (g:Genre) require g.name is unique",
    "create constraint user_id_unique if not exists for (u:User) require u.userId is unique",
];

/// Creates the constraints the graph sinks rely on. Existing constraints are left as they are.
pub async fn apply_constraints(graph: &Graph) -> FanoutResult<()> {
    for constraint in CONSTRAINTS {
        graph
            .run(query(constraint))
            .await
            .map_err(|err| graph_error(err, ErrorKind::ConfigError))?;
    }

    info!(constraints = CONSTRAINTS.len(), "applied graph constraints");

    Ok(())
}
