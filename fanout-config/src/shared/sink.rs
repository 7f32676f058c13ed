use serde::Deserialize;

use crate::shared::{Neo4jConnectionConfig, PgConnectionConfig, ValidationError};

/// A replication target. Each configured sink receives both the movie and the rating
/// pipelines.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking secrets.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SinkConfig {
    /// In-process sink that keeps records in memory, for dry runs.
    Memory { name: String },
    /// Postgres database holding the `movies` schema.
    Postgres {
        name: String,
        connection: PgConnectionConfig,
    },
    /// Neo4j graph of `Movie`, `Genre` and `User` nodes.
    Neo4j {
        name: String,
        connection: Neo4jConnectionConfig,
    },
}

impl SinkConfig {
    pub fn name(&self) -> &str {
        match self {
            SinkConfig::Memory { name }
            | SinkConfig::Postgres { name, .. }
            | SinkConfig::Neo4j { name, .. } => name,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "sinks[].name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        match self {
            SinkConfig::Memory { .. } => Ok(()),
            SinkConfig::Postgres { connection, .. } => connection.tls.validate(),
            SinkConfig::Neo4j { connection, .. } => connection.validate(),
        }
    }
}
