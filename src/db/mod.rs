//! Database connection management
//!
//! Pool over the `Any` driver: `postgresql://` URLs in deployment,
//! `sqlite://` URLs for local runs and tests.

use sqlx::{Any, AnyPool};
use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use std::time::Duration;

use crate::config::DatabaseConfig;

const MEMBER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS member (
    member_id TEXT PRIMARY KEY,
    money BIGINT NOT NULL DEFAULT 0
)"#;

/// Connection pool shared by the store and the transaction managers
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Create a new connection pool
    ///
    /// Callers that find the pool exhausted wait up to
    /// `acquire_timeout_ms` before failing with `PoolTimedOut`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect(&config.url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            acquire_timeout_ms = config.acquire_timeout_ms,
            "Connection pool established"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Borrow a connection; it goes back to the pool when dropped
    pub async fn acquire(&self) -> Result<PoolConnection<Any>, sqlx::Error> {
        let conn = self.pool.acquire().await?;
        tracing::debug!(
            pool_size = self.pool.size(),
            idle = self.pool.num_idle(),
            "Connection acquired"
        );
        Ok(conn)
    }

    /// Create the `member` table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(MEMBER_SCHEMA).execute(&self.pool).await?;
        tracing::info!("Member schema ready");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close every connection and refuse new acquisitions
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
