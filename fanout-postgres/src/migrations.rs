use fanout_config::shared::{FANOUT_MIGRATION_OPTIONS, IntoConnectOptions, PgConnectionConfig};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// Schema holding the `_sqlx_migrations` metadata table.
const MIGRATIONS_SCHEMA: &str = "fanout";

/// Applies the `movies` and `jobs` schema migrations to the database of `connection_config`.
///
/// The migration metadata table lives in its own schema to keep `public` clean.
pub async fn apply_migrations(connection_config: &PgConnectionConfig) -> Result<(), sqlx::Error> {
    let options = connection_config.with_db(Some(&FANOUT_MIGRATION_OPTIONS));

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute(&*format!("create schema if not exists {MIGRATIONS_SCHEMA};"))
                    .await?;
                conn.execute(&*format!("set search_path = '{MIGRATIONS_SCHEMA}';"))
                    .await?;

                Ok(())
            })
        })
        .connect_with(options)
        .await?;

    info!(database = %connection_config.name, "applying migrations");

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!(database = %connection_config.name, "migrations successfully applied");

    Ok(())
}
