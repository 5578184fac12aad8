//! Cache teardown phase.
//!
//! Probe → log statistics → release. An unreachable cache is reported as
//! degraded and the release is still attempted.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::cache::backend::CacheBackend;
use crate::lifecycle::sequencer::{PhaseOutcome, PhaseReport};

pub struct CacheTeardown {
    backend: Arc<dyn CacheBackend>,
}

impl CacheTeardown {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Run the phase within `timeout`.
    ///
    /// The probe may use at most half of the budget so a hanging backend
    /// still leaves time for the release attempt.
    pub async fn run(self, timeout: Duration) -> PhaseReport {
        let start = Instant::now();
        let deadline = start + timeout;
        let backend = self.backend.name();

        let probe = match timeout_at(start + timeout / 2, self.backend.ping()).await {
            Ok(Ok(())) => {
                let stats = self.backend.stats();
                tracing::info!(
                    backend,
                    hit_rate = stats.hit_rate,
                    hits = stats.hits,
                    misses = stats.misses,
                    invalidations = stats.invalidations,
                    "Cache statistics at shutdown"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("liveness probe timed out".to_string()),
        };
        if let Err(reason) = &probe {
            tracing::warn!(backend, reason = %reason, "Cache unavailable, skipping statistics");
        }

        match timeout_at(deadline, self.backend.close()).await {
            Err(_) => {
                tracing::warn!(
                    backend,
                    timeout_secs = timeout.as_secs(),
                    "Cache release did not finish in time"
                );
                PhaseReport::timed_out(0, 1)
            }
            Ok(Err(e)) => {
                tracing::warn!(backend, error = %e, "Cache release failed");
                PhaseReport::degraded(format!("cache release failed: {e}"))
            }
            Ok(Ok(())) => {
                tracing::info!(backend, "Cache connection released");
                match probe {
                    Ok(()) => PhaseReport::completed(1),
                    Err(reason) => PhaseReport {
                        outcome: PhaseOutcome::Degraded,
                        completed: 1,
                        abandoned: 0,
                        detail: Some(format!("cache unavailable: {reason}")),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::CacheError;
    use crate::cache::memory::MemoryCache;

    #[tokio::test]
    async fn healthy_cache_completes() {
        let cache = Arc::new(MemoryCache::new());
        let report = CacheTeardown::new(cache.clone())
            .run(Duration::from_secs(1))
            .await;

        assert_eq!(report.outcome, PhaseOutcome::Completed);
        assert!(matches!(cache.ping().await, Err(CacheError::Closed)));
    }

    #[tokio::test]
    async fn already_released_cache_is_degraded() {
        let cache = Arc::new(MemoryCache::new());
        cache.close().await.unwrap();

        let report = CacheTeardown::new(cache).run(Duration::from_secs(1)).await;
        assert_eq!(report.outcome, PhaseOutcome::Degraded);
        assert!(report.detail.unwrap().contains("cache unavailable"));
    }
}
