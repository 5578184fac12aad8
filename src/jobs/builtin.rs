//! Built-in background jobs.
//!
//! | Name | Work per tick |
//! |---|---|
//! | `storage-heartbeat` | liveness probe against the storage pool |
//! | `cache-stats-reporter` | one log line with the cache statistics |
//! | `channel-heartbeat` | keep-alive event to every realtime subscriber |

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheBackend;
use crate::config::JobsConfig;
use crate::jobs::periodic::run_periodic;
use crate::lifecycle::tasks::{RegistryError, TaskRegistry};
use crate::realtime::{ChannelEvent, ChannelRegistry};
use crate::storage::StoragePool;

pub const STORAGE_HEARTBEAT: &str = "storage-heartbeat";
pub const CACHE_STATS_REPORTER: &str = "cache-stats-reporter";
pub const CHANNEL_HEARTBEAT: &str = "channel-heartbeat";

/// Shared handles the built-in jobs operate on.
#[derive(Clone)]
pub struct JobDependencies {
    pub storage: Arc<dyn StoragePool>,
    pub cache: Arc<dyn CacheBackend>,
    pub channels: Arc<dyn ChannelRegistry>,
}

/// Register every built-in job. Returns how many were registered.
pub fn register_builtin_jobs(
    registry: &TaskRegistry,
    config: &JobsConfig,
    deps: JobDependencies,
) -> Result<usize, RegistryError> {
    if !config.enabled {
        tracing::info!("Built-in background jobs disabled");
        return Ok(0);
    }

    let storage = deps.storage;
    let period = Duration::from_secs(config.storage_heartbeat_secs);
    registry.register(STORAGE_HEARTBEAT, move |shutdown| async move {
        run_periodic(STORAGE_HEARTBEAT, period, shutdown, move || {
            let storage = Arc::clone(&storage);
            async move {
                match storage.ping().await {
                    Ok(()) => {
                        let stats = storage.stats();
                        tracing::debug!(size = stats.size, idle = stats.idle, "Storage heartbeat ok");
                    }
                    Err(e) => tracing::warn!(error = %e, "Storage heartbeat failed"),
                }
            }
        })
        .await;
    })?;

    let cache = deps.cache;
    let period = Duration::from_secs(config.cache_stats_secs);
    registry.register(CACHE_STATS_REPORTER, move |shutdown| async move {
        run_periodic(CACHE_STATS_REPORTER, period, shutdown, move || {
            let stats = cache.stats();
            let backend = cache.name();
            async move {
                tracing::info!(
                    backend,
                    hit_rate = stats.hit_rate,
                    hits = stats.hits,
                    misses = stats.misses,
                    invalidations = stats.invalidations,
                    "Cache statistics"
                );
            }
        })
        .await;
    })?;

    let channels = deps.channels;
    let period = Duration::from_secs(config.channel_heartbeat_secs);
    registry.register(CHANNEL_HEARTBEAT, move |shutdown| async move {
        let mut seq = 0u64;
        run_periodic(CHANNEL_HEARTBEAT, period, shutdown, move || {
            seq += 1;
            let delivered = channels.broadcast(&ChannelEvent::Heartbeat { seq });
            async move {
                tracing::trace!(seq, delivered, "Channel heartbeat sent");
            }
        })
        .await;
    })?;

    Ok(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::StorageConfig;
    use crate::lifecycle::ShutdownCoordinator;
    use crate::realtime::ChannelHub;
    use crate::storage::SqliteStorage;

    async fn deps(hub: Arc<ChannelHub>) -> JobDependencies {
        let storage = SqliteStorage::connect(&StorageConfig {
            database_url: "sqlite::memory:".to_string(),
            ..StorageConfig::default()
        })
        .await
        .unwrap();
        JobDependencies {
            storage: Arc::new(storage),
            cache: Arc::new(MemoryCache::new()),
            channels: hub,
        }
    }

    #[tokio::test]
    async fn jobs_run_and_stop_on_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let registry = TaskRegistry::new(coordinator.clone());
        let hub = Arc::new(ChannelHub::new());
        let mut subscription = hub.subscribe();

        let config = JobsConfig {
            enabled: true,
            storage_heartbeat_secs: 1,
            cache_stats_secs: 1,
            channel_heartbeat_secs: 1,
        };
        let registered = register_builtin_jobs(&registry, &config, deps(hub.clone()).await).unwrap();
        assert_eq!(registered, 3);
        assert_eq!(registry.len(), 3);

        let frame = tokio::time::timeout(Duration::from_secs(3), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        let event: ChannelEvent = serde_json::from_str(&frame).unwrap();
        assert_eq!(event, ChannelEvent::Heartbeat { seq: 1 });

        coordinator.trigger();
        let report = registry.await_all(Duration::from_secs(2)).await;
        assert_eq!(report.completed.len(), 3);
        assert!(report.abandoned.is_empty());
    }

    #[tokio::test]
    async fn disabled_jobs_register_nothing() {
        let registry = TaskRegistry::new(ShutdownCoordinator::new());
        let config = JobsConfig {
            enabled: false,
            ..JobsConfig::default()
        };
        let hub = Arc::new(ChannelHub::new());
        assert_eq!(register_builtin_jobs(&registry, &config, deps(hub).await).unwrap(), 0);
        assert!(registry.is_empty());
    }
}
