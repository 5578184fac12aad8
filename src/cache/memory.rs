//! In-process cache backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::cache::backend::{CacheBackend, CacheError, CacheStats, CacheStatsSnapshot};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A thread-safe TTL cache used when no Redis URL is configured.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    stats: CacheStats,
    closed: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until next lookup.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.ensure_open()?;
        let now = Instant::now();

        let found = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            _ => None,
        };
        match found {
            Some(value) => {
                self.stats.record_hit();
                Ok(Some(value))
            }
            None => {
                self.entries.remove_if(key, |_, entry| !entry.is_live(now));
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.ensure_open()?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        self.ensure_open()?;
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.stats.record_invalidation();
        }
        Ok(existed)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.ensure_open()
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    async fn close(&self) -> Result<(), CacheError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let dropped = self.entries.len();
            self.entries.clear();
            tracing::debug!(entries = dropped, "In-memory cache released");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
