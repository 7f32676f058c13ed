use fanout_config::shared::{IntoConnectOptions, MySqlConnectionConfig};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;

/// Duration after which idle connections are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates a lazily connected pool to the source database.
///
/// Every sink reads the source concurrently, so the pool should allow one connection per
/// sink.
pub fn create_mysql_pool(config: &MySqlConnectionConfig, max_connections: u32) -> MySqlPool {
    MySqlPoolOptions::new()
        .min_connections(0)
        .max_connections(max_connections.max(1))
        .idle_timeout(Some(IDLE_TIMEOUT))
        .connect_lazy_with(config.with_db(None))
}
