//! Connection pool construction and migration. Grounded on the teacher's
//! persister in spirit (one place that owns the durable store's connection
//! lifecycle, `node/src/persister.rs`), adapted to `sqlx`'s own pool type
//! since this system talks to Postgres directly rather than through a
//! backend API.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

pub type Pool = PgPool;

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Pool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(anyhow::Error::from)
}

/// Runs every migration under `store/migrations`. Idempotent: migrations
/// already applied are skipped.
pub async fn migrate(pool: &Pool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
