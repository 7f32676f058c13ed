//! Neo4j adapters: movie and rating sinks writing a graph of `Movie`, `Genre` and `User`
//! nodes, and the uniqueness constraints the sinks' `MERGE`s rely on.

pub mod constraints;
pub mod graph;
pub mod sink;
#[cfg(feature = "test-utils")]
pub mod test_utils;
