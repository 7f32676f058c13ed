//! Sinks writing replicated records into the graph.

mod movies;
mod ratings;

pub use movies::Neo4jMovieSink;
pub use ratings::Neo4jRatingSink;

use fanout::error::{ErrorKind, FanoutError};

use crate::graph::graph_error;

/// Classifies a failure while applying a batch.
fn apply_error(err: neo4rs::Error) -> FanoutError {
    graph_error(err, ErrorKind::ApplyError)
}

/// Classifies a failure while reading the sink's own nodes.
fn query_error(err: neo4rs::Error) -> FanoutError {
    graph_error(err, ErrorKind::SinkQueryFailed)
}
