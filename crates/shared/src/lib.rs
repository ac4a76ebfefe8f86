//! Shared infrastructure helpers for basalt services
//!
//! Connection construction for PostgreSQL and Redis, plus embedded
//! migrations. Every service binary goes through these so pool sizing and
//! timeout policy live in one place.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create the main database pool used for request handling.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Create a pool suitable for running migrations.
///
/// Migrations need longer statement timeouts than request traffic, and must
/// talk to the database directly rather than through a transaction pooler.
pub async fn create_migration_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Run embedded migrations against the given pool.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Create the Redis connection manager backing the refresh-token store.
///
/// `ConnectionManager` reconnects automatically and is cheap to clone, so a
/// single manager is shared across the whole service.
pub async fn create_redis(redis_url: &str) -> anyhow::Result<redis::aio::ConnectionManager> {
    let client = redis::Client::open(redis_url)?;
    let manager = redis::aio::ConnectionManager::new(client).await?;
    Ok(manager)
}
