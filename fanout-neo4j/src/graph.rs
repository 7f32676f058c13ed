use fanout::error::{ErrorKind, FanoutError, FanoutResult};
use fanout::fanout_error;
use fanout_config::shared::Neo4jConnectionConfig;
use neo4rs::{ConfigBuilder, Graph};
use secrecy::ExposeSecret;
use std::error;

/// Opens a pooled connection to the graph database of `config`.
pub async fn connect_graph(
    config: &Neo4jConnectionConfig,
    max_connections: usize,
) -> FanoutResult<Graph> {
    let mut builder = ConfigBuilder::default()
        .uri(config.uri.as_str())
        .user(config.username.as_str())
        .max_connections(max_connections.max(1));

    if let Some(password) = &config.password {
        builder = builder.password(password.expose_secret().as_str());
    }

    if let Some(database) = &config.database {
        builder = builder.db(database.as_str());
    }

    let graph_config = builder
        .build()
        .map_err(|err| graph_error(err, ErrorKind::ConfigError))?;

    Graph::connect(graph_config)
        .await
        .map_err(|err| graph_error(err, ErrorKind::ConnectivityError))
}

/// Classifies a driver failure.
///
/// Failures to reach the server are always [`ErrorKind::ConnectivityError`], everything else
/// gets `kind`.
pub fn graph_error(err: neo4rs::Error, kind: ErrorKind) -> FanoutError {
    let (kind, description) = match &err {
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => (
            ErrorKind::ConnectivityError,
            "Graph database is unreachable",
        ),
        _ => (kind, "Graph database operation failed"),
    };

    fanout_error!(kind, description, err.to_string(), source: err)
}

/// Classifies a failure to decode a returned row.
pub fn decode_error<E>(err: E) -> FanoutError
where
    E: error::Error + Send + Sync + 'static,
{
    fanout_error!(
        ErrorKind::ConversionError,
        "Graph value decoding failed",
        err.to_string(),
        source: err
    )
}
