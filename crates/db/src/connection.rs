//! SQLite pool construction, tuned from [`DatabaseConfig`].

use std::time::Duration;

use crosstalk_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Open a pool with the deployment's database settings. Every new connection
/// gets the same pragma set: foreign keys on, WAL journaling, and the
/// configured busy timeout so concurrent webhook deliveries queue on the
/// writer lock instead of failing with SQLITE_BUSY.
pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let busy_timeout_ms = database.busy_timeout_ms;
    SqlitePoolOptions::new()
        .max_connections(database.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(database.timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&database.url)
        .await
}

/// Convenience for tests and one-off tooling that only has a URL in hand.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    connect(&DatabaseConfig {
        url: database_url.to_string(),
        max_connections,
        timeout_secs,
        ..DatabaseConfig::default()
    })
    .await
}
