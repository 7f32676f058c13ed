//! Configuration types shared by the fanout crates.

mod aggregation;
mod audit;
mod base;
mod connection;
mod replication;
mod replicator;
mod sink;

pub use aggregation::AggregationConfig;
pub use audit::AuditConfig;
pub use base::ValidationError;
pub use connection::{
    FANOUT_MIGRATION_OPTIONS, FANOUT_SINK_OPTIONS, FANOUT_STORE_OPTIONS, IntoConnectOptions,
    MySqlConnectionConfig, Neo4jConnectionConfig, PgConnectionConfig, PgConnectionOptions, TlsConfig,
};
pub use replication::ReplicationConfig;
pub use replicator::ReplicatorConfig;
pub use sink::SinkConfig;
