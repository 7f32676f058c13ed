//! Postgres adapters: movie and rating sinks, the aggregation store, the run lock and the
//! schema migrations they rely on.

pub mod lock;
pub mod migrations;
pub mod pool;
pub mod sink;
pub mod sqlx;
pub mod store;
