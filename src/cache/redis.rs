//! Redis cache backend.
//!
//! # Design Decisions
//! - One multiplexed `ConnectionManager`, cloned per command
//! - `close` drops the manager; every later command fails with `Closed`

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::cache::backend::{CacheBackend, CacheError, CacheStats, CacheStatsSnapshot};

/// Redis-backed cache.
pub struct RedisCache {
    url: String,
    conn: RwLock<Option<ConnectionManager>>,
    stats: CacheStats,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("url", &self.url)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl RedisCache {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        let cache = Self {
            url: url.to_string(),
            conn: RwLock::new(Some(manager)),
            stats: CacheStats::default(),
        };
        cache.ping().await?;

        tracing::info!(url = %url, "Redis cache connected");
        Ok(cache)
    }

    async fn conn(&self) -> Result<ConnectionManager, CacheError> {
        self.conn.read().await.clone().ok_or(CacheError::Closed)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(key).await?;
        if removed > 0 {
            self.stats.record_invalidation();
        }
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    async fn close(&self) -> Result<(), CacheError> {
        if self.conn.write().await.take().is_some() {
            tracing::debug!(url = %self.url, "Redis connection released");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
