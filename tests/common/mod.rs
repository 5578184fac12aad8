//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use insights_backend::cache::{CacheBackend, CacheError, CacheStats, CacheStatsSnapshot};
use insights_backend::config::{ServiceConfig, ShutdownConfig};
use insights_backend::realtime::{ChannelEvent, ChannelHub, ChannelRegistry, SubscriberId};
use insights_backend::storage::{PoolStats, StorageError, StoragePool};

/// Timestamped record of calls made into the test doubles.
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<(&'static str, Instant)>>>,
}

impl Journal {
    pub fn record(&self, event: &'static str) {
        self.entries.lock().unwrap().push((event, Instant::now()));
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.entries.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }

    pub fn at(&self, event: &'static str) -> Option<Instant> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(e, _)| *e == event)
            .map(|(_, at)| *at)
    }
}

/// Cache whose probe can be made to fail.
pub struct FakeCache {
    journal: Journal,
    ping_fails: bool,
    stats: CacheStats,
}

impl FakeCache {
    pub fn healthy(journal: Journal) -> Arc<Self> {
        Arc::new(Self { journal, ping_fails: false, stats: CacheStats::default() })
    }

    pub fn unreachable(journal: Journal) -> Arc<Self> {
        Arc::new(Self { journal, ping_fails: true, stats: CacheStats::default() })
    }
}

#[async_trait]
impl CacheBackend for FakeCache {
    async fn get_raw(&self, _key: &str) -> Result<Option<String>, CacheError> {
        self.stats.record_miss();
        Ok(None)
    }

    async fn set_raw(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn invalidate(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.journal.record("cache.ping");
        if self.ping_fails {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.journal.record("cache.close");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Storage pool whose close can be made to hang.
pub struct FakeStorage {
    journal: Journal,
    close_hangs: bool,
    closed: AtomicBool,
}

impl FakeStorage {
    pub fn healthy(journal: Journal) -> Arc<Self> {
        Arc::new(Self { journal, close_hangs: false, closed: AtomicBool::new(false) })
    }

    pub fn hanging(journal: Journal) -> Arc<Self> {
        Arc::new(Self { journal, close_hangs: true, closed: AtomicBool::new(false) })
    }
}

#[async_trait]
impl StoragePool for FakeStorage {
    async fn ping(&self) -> Result<(), StorageError> {
        self.journal.record("storage.ping");
        Ok(())
    }

    fn stats(&self) -> PoolStats {
        PoolStats { size: 1, idle: 1 }
    }

    async fn close(&self) {
        self.journal.record("storage.close");
        if self.close_hangs {
            std::future::pending::<()>().await;
        }
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Channel registry that journals notices and closes, backed by a real hub.
pub struct RecordingChannels {
    pub hub: ChannelHub,
    journal: Journal,
}

impl RecordingChannels {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self { hub: ChannelHub::new(), journal })
    }
}

impl ChannelRegistry for RecordingChannels {
    fn broadcast(&self, event: &ChannelEvent) -> usize {
        self.journal.record("channels.broadcast");
        self.hub.broadcast(event)
    }

    fn notify_terminal(&self, event: &ChannelEvent) -> usize {
        self.journal.record("channels.notice");
        self.hub.notify_terminal(event)
    }

    fn subscribers(&self) -> Vec<SubscriberId> {
        self.hub.subscribers()
    }

    fn close_all(&self) -> usize {
        self.journal.record("channels.close_all");
        self.hub.close_all()
    }
}

/// Service config bound to an ephemeral local port with in-memory backends.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.storage.database_url = "sqlite::memory:".to_string();
    config.jobs.enabled = false;
    config
}

pub fn shutdown_config(background: Duration, db: Duration) -> ShutdownConfig {
    ShutdownConfig {
        listener_drain_timeout: Duration::from_secs(2),
        background_task_timeout: background,
        cache_timeout: db,
        storage_timeout: db,
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
