use fanout_config::shared::{IntoConnectOptions, MySqlConnectionConfig};
use sqlx::{Connection, Executor, MySqlConnection, MySqlPool};

/// Creates a new MySQL database with empty `movies` and `ratings` tables and returns a
/// connection pool to it.
///
/// # Panics
/// Panics if any database operation fails.
pub async fn create_mysql_database(config: &MySqlConnectionConfig) -> MySqlPool {
    let mut connection = MySqlConnection::connect_with(&config.without_db(None))
        .await
        .expect("Failed to connect to MySQL");
    connection
        .execute(&*format!("create database `{}`", config.name))
        .await
        .expect("Failed to create database");

    let pool = MySqlPool::connect_with(config.with_db(None))
        .await
        .expect("Failed to connect to MySQL database");

    pool.execute(
        r#"
        create table movies (
            movieId int primary key,
            title varchar(255) not null,
            genres varchar(255) not null
        )
        "#,
    )
    .await
    .expect("Failed to create movies table");
    pool.execute(
        r#"
        create table ratings (
            userId int not null,
            movieId int not null,
            rating decimal(2, 1) not null,
            `timestamp` bigint not null,
            primary key (userId, movieId)
        )
        "#,
    )
    .await
    .expect("Failed to create ratings table");

    pool
}

/// Drops a MySQL database.
///
/// # Panics
/// Panics if any database operation fails.
pub async fn drop_mysql_database(config: &MySqlConnectionConfig) {
    let mut connection = MySqlConnection::connect_with(&config.without_db(None))
        .await
        .expect("Failed to connect to MySQL");

    connection
        .execute(&*format!("drop database if exists `{}`", config.name))
        .await
        .expect("Failed to drop database");
}
