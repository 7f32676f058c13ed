use serde::Deserialize;
use std::collections::HashSet;

use crate::Config;
use crate::shared::{
    AggregationConfig, AuditConfig, MySqlConnectionConfig, PgConnectionConfig,
    ReplicationConfig, SinkConfig, ValidationError,
};

/// Complete configuration of the replicator binary.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking secrets.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatorConfig {
    /// The MySQL source of truth.
    pub source: MySqlConnectionConfig,
    /// Targets the source is replicated into.
    pub sinks: Vec<SinkConfig>,
    /// Postgres database holding job batches, raw facts and aggregates. Also hosts the
    /// advisory locks that keep runs of the same pipeline exclusive.
    pub store: PgConnectionConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl ReplicatorConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.tls.validate()?;
        self.store.tls.validate()?;

        if self.sinks.is_empty() {
            return Err(ValidationError::NoSinks);
        }

        let mut names = HashSet::new();
        for sink in &self.sinks {
            sink.validate()?;
            if !names.insert(sink.name()) {
                return Err(ValidationError::DuplicateSinkName(sink.name().to_string()));
            }
        }

        self.replication.validate()?;
        self.aggregation.validate()?;
        self.audit.validate()
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "source": {"host": "localhost", "port": 3306, "name": "movielens", "username": "root"},
        "sinks": [
            {"type": "postgres", "name": "warehouse", "connection": {
                "host": "localhost", "port": 5432, "name": "movies", "username": "postgres"
            }},
            {"type": "neo4j", "name": "graph", "connection": {
                "uri": "neo4j://localhost:7687", "username": "neo4j", "password": "secret"
            }},
            {"type": "memory", "name": "dry-run"}
        ],
        "store": {"host": "localhost", "port": 5432, "name": "movies", "username": "postgres"}
    }"#;

    #[test]
    fn deserializes_with_default_sections() {
        let config: ReplicatorConfig = serde_json::from_str(CONFIG).unwrap();

        assert_eq!(config.sinks.len(), 3);
        assert_eq!(config.sinks[0].name(), "warehouse");
        assert!(matches!(
            &config.sinks[1],
            SinkConfig::Neo4j { name, connection } if name == "graph" && connection.database.is_none()
        ));
        assert_eq!(config.replication.batch_size, 1000);
        assert_eq!(config.aggregation.partition_width, 1000);
        assert_eq!(config.audit.sample_fraction, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_sink_names_are_rejected() {
        let mut config: ReplicatorConfig = serde_json::from_str(CONFIG).unwrap();
        config.sinks.push(SinkConfig::Memory {
            name: "warehouse".to_string(),
        });

        assert!(matches!(
            config.validate(),
            Err(ValidationError::DuplicateSinkName(name)) if name == "warehouse"
        ));
    }

    #[test]
    fn neo4j_sink_without_uri_is_rejected() {
        let mut config: ReplicatorConfig = serde_json::from_str(CONFIG).unwrap();
        if let SinkConfig::Neo4j { connection, .. } = &mut config.sinks[1] {
            connection.uri.clear();
        }

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { field, .. }) if field == "sinks[].connection.uri"
        ));
    }
}
