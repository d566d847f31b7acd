//! Database connection pool manager.
//!
//! Owns the single pool for the sales database. The pool is opened and probed
//! once at startup; every later operation checks a connection out of it and
//! the connection returns to the pool when the guard drops, on every path.

use std::time::{Duration, Instant};

use common::errors::{AppError, AppResult};
use common::models::connection::{ConnectionConfig, DbType};
use serde::Serialize;
use sqlx::{mysql::MySqlPoolOptions, sqlite::SqlitePoolOptions};
use sqlx::{MySqlPool, SqlitePool};
use utoipa::ToSchema;

/// Connection pool wrapper for the supported database types.
#[derive(Clone, Debug)]
pub enum DatabasePool {
    /// MySQL connection pool.
    MySQL(MySqlPool),
    /// SQLite connection pool.
    SQLite(SqlitePool),
}

impl DatabasePool {
    pub fn db_type(&self) -> DbType {
        match self {
            DatabasePool::MySQL(_) => DbType::MySQL,
            DatabasePool::SQLite(_) => DbType::SQLite,
        }
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PoolStats {
    /// Number of active (in-use) connections.
    pub active: u32,
    /// Number of idle connections.
    pub idle: u32,
    /// Maximum pool size configured.
    pub max_size: u32,
    /// Whether the pool is open.
    pub is_connected: bool,
}

/// Manages the sales database connection pool.
pub struct PoolManager {
    config: ConnectionConfig,
    pool: DatabasePool,
}

impl PoolManager {
    /// Opens the pool and probes it with a round trip.
    ///
    /// # Errors
    /// Returns `AppError::DatabaseConnection` when the server is unreachable,
    /// credentials are rejected or the database does not exist.
    pub async fn connect(config: ConnectionConfig) -> AppResult<Self> {
        let pool = Self::create_pool(&config).await?;
        let manager = Self { config, pool };
        let latency = manager.probe().await?;
        tracing::info!(
            db_type = %manager.config.db_type,
            url = %manager.config.redacted_url(),
            latency_ms = latency.as_millis() as u64,
            "Connected successfully to the database"
        );
        Ok(manager)
    }

    async fn create_pool(config: &ConnectionConfig) -> AppResult<DatabasePool> {
        let url = config.connection_url()?;
        let timeout = Duration::from_secs(config.connect_timeout_secs);

        match config.db_type {
            DbType::MySQL => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(config.pool_size())
                    .acquire_timeout(timeout)
                    .connect(&url)
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
                Ok(DatabasePool::MySQL(pool))
            }
            DbType::SQLite => {
                // An in-memory database lives as long as its only connection.
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.pool_size())
                    .acquire_timeout(timeout)
                    .idle_timeout(None::<Duration>)
                    .max_lifetime(None::<Duration>)
                    .connect(&url)
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
                Ok(DatabasePool::SQLite(pool))
            }
        }
    }

    /// Runs `SELECT 1` on a pooled connection and returns the latency.
    pub async fn probe(&self) -> AppResult<Duration> {
        let start = Instant::now();
        match &self.pool {
            DatabasePool::MySQL(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
            }
            DatabasePool::SQLite(pool) => {
                sqlx::query("SELECT 1")
                    .execute(pool)
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
            }
        }
        Ok(start.elapsed())
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub fn db_type(&self) -> DbType {
        self.pool.db_type()
    }

    /// Current pool usage.
    pub fn stats(&self) -> PoolStats {
        let (size, idle, closed) = match &self.pool {
            DatabasePool::MySQL(p) => (p.size(), p.num_idle() as u32, p.is_closed()),
            DatabasePool::SQLite(p) => (p.size(), p.num_idle() as u32, p.is_closed()),
        };
        PoolStats {
            active: size.saturating_sub(idle),
            idle,
            max_size: self.config.pool_size(),
            is_connected: !closed,
        }
    }

    /// Closes every connection in the pool.
    pub async fn close(&self) {
        match &self.pool {
            DatabasePool::MySQL(p) => p.close().await,
            DatabasePool::SQLite(p) => p.close().await,
        }
    }
}
