use fanout_config::shared::Neo4jConnectionConfig;
use neo4rs::{Graph, query};

use crate::constraints::apply_constraints;
use crate::graph::connect_graph;

/// Builds a connection config for the test server.
///
/// The server is read from `TESTS_NEO4J_URI`, `TESTS_NEO4J_USERNAME` and optionally
/// `TESTS_NEO4J_PASSWORD`. Community servers host a single database, so tests share it and
/// must clear it with [`clear_graph`] first.
///
/// # Panics
/// Panics if a required variable is missing.
pub fn test_neo4j_config() -> Neo4jConnectionConfig {
    Neo4jConnectionConfig {
        uri: std::env::var("TESTS_NEO4J_URI").expect("TESTS_NEO4J_URI must be set"),
        username: std::env::var("TESTS_NEO4J_USERNAME")
            .expect("TESTS_NEO4J_USERNAME must be set"),
        password: std::env::var("TESTS_NEO4J_PASSWORD")
            .ok()
            .map(Into::into),
        database: None,
    }
}

/// Connects to the test server and applies the sink constraints.
///
/// # Panics
/// Panics if the server cannot be reached.
pub async fn connect_test_graph(config: &Neo4jConnectionConfig) -> Graph {
    let graph = connect_graph(config, 4)
        .await
        .expect("Failed to connect to Neo4j");
    apply_constraints(&graph)
        .await
        .expect("Failed to apply graph constraints");

    graph
}

/// Deletes every node the sinks write, with their edges.
///
/// # Panics
/// Panics if the deletion fails.
pub async fn clear_graph(graph: &Graph) {
    graph
        .run(query(
            "match (n) where n:Movie or n:Genre or n:User detach delete n",
        ))
        .await
        .expect("Failed to clear the graph");
}
