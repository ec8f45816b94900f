//! Database layer - queue store backends and pool setup

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::InMemoryQueueStore;
pub use postgres::PostgresQueueStore;
pub use traits::QueueStore;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;
use std::time::Duration;

use crate::config::DatabaseConfig;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Connect to PostgreSQL with statement and lock timeouts set on every connection.
pub async fn create_pool(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let statement_timeout_ms = config.statement_timeout_seconds * 1000;
    let lock_timeout_ms = config.lock_timeout_seconds * 1000;

    let pool = PgPoolOptions::new()
        .min_connections(config.pool_min_size)
        .max_connections(config.pool_max_size)
        .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(
                    format!(
                        "SET statement_timeout = {statement_timeout_ms}; SET lock_timeout = {lock_timeout_ms};"
                    )
                    .as_str(),
                )
                .await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    MIGRATOR.run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
