use fanout_config::shared::{IntoConnectOptions, PgConnectionConfig, PgConnectionOptions};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Duration after which idle connections are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates a lazily connected pool.
///
/// No connection is opened until the first query, so an unreachable database surfaces as a
/// connectivity error of the first operation rather than here.
pub fn create_pg_pool(
    config: &PgConnectionConfig,
    options: &PgConnectionOptions,
    max_connections: u32,
) -> PgPool {
    PgPoolOptions::new()
        .min_connections(0)
        .max_connections(max_connections.max(1))
        .idle_timeout(Some(IDLE_TIMEOUT))
        .connect_lazy_with(config.with_db(Some(options)))
}
