//! Persistent storage pool.
//!
//! # Responsibilities
//! - Open the SQLite pool with the configured limits and statement logging
//! - Answer liveness probes and report pool occupancy
//! - Close the pool on request, waiting for checked-out connections

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use thiserror::Error;

use crate::config::StorageConfig;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid statement log level '{0}'")]
    LogLevel(String),

    #[error("storage pool closed")]
    Closed,
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

/// Operations the storage teardown needs from a pool.
#[async_trait]
pub trait StoragePool: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> Result<(), StorageError>;

    fn stats(&self) -> PoolStats;

    /// Close the pool. Resolves once every connection has been returned
    /// and closed, which may never happen if a holder is stuck.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// SQLite-backed pool.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open the pool described by `config`.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let statement_level = log::LevelFilter::from_str(&config.statement_log_level)
            .map_err(|_| StorageError::LogLevel(config.statement_log_level.clone()))?;

        let mut options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .log_slow_statements(
                log::LevelFilter::Warn,
                Duration::from_millis(config.slow_statement_ms),
            );
        options = if config.log_all_statements {
            options.log_statements(statement_level)
        } else {
            options.log_statements(log::LevelFilter::Off)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .max_lifetime(Some(Duration::from_secs(config.max_lifetime_secs)))
            .connect_with(options)
            .await?;

        tracing::info!(
            database_url = %config.database_url,
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Storage pool connected"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StoragePool for SqliteStorage {
    async fn ping(&self) -> Result<(), StorageError> {
        if self.pool.is_closed() {
            return Err(StorageError::Closed);
        }
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
