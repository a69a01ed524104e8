//! Postgres connection pool and schema migrations.

use anyhow::Context;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::DbConfig;

pub async fn connect(cfg: &DbConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.connect_timeout)
        .idle_timeout(cfg.idle_timeout)
        .connect(&cfg.url)
        .await
        .context("failed to connect to Postgres")?;
    tracing::info!(max_connections = cfg.max_connections, "postgres pool ready");
    Ok(pool)
}

/// Apply pending migrations from `migrations/` at the workspace root.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    tracing::info!("database migrations applied");
    Ok(())
}
