//! Cache backend contract and statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis command or connection failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Value could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend was already released.
    #[error("cache connection closed")]
    Closed,
}

/// Read-only statistics captured at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    /// Fraction of lookups that hit, `0.0` when there were none.
    pub hit_rate: f64,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// Lock-free counters shared by every backend.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStatsSnapshot {
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            hits,
            misses,
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Operations the service and the cache teardown need from a cache.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a raw value. Counts a hit or a miss.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a raw value with a time-to-live.
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a key. Returns whether it existed.
    async fn invalidate(&self, key: &str) -> Result<bool, CacheError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), CacheError>;

    fn stats(&self) -> CacheStatsSnapshot;

    /// Release the connection. Later operations fail with [`CacheError::Closed`].
    async fn close(&self) -> Result<(), CacheError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
