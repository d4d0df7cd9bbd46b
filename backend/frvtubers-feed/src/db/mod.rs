pub mod memory;
pub mod post_repo;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::Result;

pub use memory::InMemoryPostStore;
pub use post_repo::{PgPostStore, PostStore};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connects, verifies the connection and applies pending migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    MIGRATOR.run(&pool).await?;

    tracing::info!(
        max_connections = config.max_connections,
        "Database pool created and migrations applied"
    );
    Ok(pool)
}
