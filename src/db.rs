use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

/// Postgres-backed implementation of the repository traits.
#[derive(Clone)]
pub struct PgRepo {
    pub pool: PgPool,
}

impl PgRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

/// Connects to the database, retrying once a second until `attempts` run out.
pub async fn connect_with_retry(database_url: &str, attempts: u32) -> anyhow::Result<PgPool> {
    info!("waiting for database");
    let mut attempt = 0;
    loop {
        attempt += 1;
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                info!(attempt, "database available");
                return Ok(pool);
            }
            Err(e) if attempt < attempts.max(1) => {
                warn!(error = %e, attempt, "database unavailable, waiting 1 second");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(e) => return Err(e).context("connect to database"),
        }
    }
}
