//! Cache client subsystem.
//!
//! # Data Flow
//! ```text
//! handlers / jobs
//!     → helpers.rs (cache-aside: get → miss → query → set)
//!     → CacheBackend (redis.rs or memory.rs)
//!     → CacheStats counters (hits, misses, invalidations)
//!
//! Shutdown (teardown.rs):
//!     ping → log CacheStatsSnapshot → close
//! ```
//!
//! # Design Decisions
//! - Eviction policy belongs to the backend; this layer only counts
//! - Backend selected by config: `redis` when a URL is set, otherwise `memory`

pub mod backend;
pub mod helpers;
pub mod memory;
pub mod redis;
pub mod teardown;

use std::sync::Arc;

pub use backend::{CacheBackend, CacheError, CacheStats, CacheStatsSnapshot};
pub use memory::MemoryCache;
pub use self::redis::RedisCache;
pub use teardown::CacheTeardown;

use crate::config::{CacheConfig, CacheKind};

/// Build the configured backend.
pub async fn connect(config: &CacheConfig) -> Result<Arc<dyn CacheBackend>, CacheError> {
    match config.backend {
        CacheKind::Memory => {
            tracing::info!("Using in-memory cache");
            Ok(Arc::new(MemoryCache::new()))
        }
        CacheKind::Redis => Ok(Arc::new(RedisCache::connect(&config.url).await?)),
    }
}
