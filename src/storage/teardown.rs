//! Storage teardown phase. Runs last.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::lifecycle::sequencer::{PhaseOutcome, PhaseReport};
use crate::storage::pool::StoragePool;

pub struct StorageTeardown {
    pool: Arc<dyn StoragePool>,
}

impl StorageTeardown {
    pub fn new(pool: Arc<dyn StoragePool>) -> Self {
        Self { pool }
    }

    /// Probe, then close the pool within `timeout`.
    ///
    /// A close that misses the deadline leaves connections open until the
    /// process exits; it is logged as a leak risk and never blocks exit.
    pub async fn run(self, timeout: Duration) -> PhaseReport {
        let start = Instant::now();
        let deadline = start + timeout;

        let probe = match timeout_at(start + timeout / 2, self.pool.ping()).await {
            Ok(Ok(())) => {
                let stats = self.pool.stats();
                tracing::info!(size = stats.size, idle = stats.idle, "Storage pool state before close");
                Ok(())
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("liveness probe timed out".to_string()),
        };
        if let Err(reason) = &probe {
            tracing::warn!(reason = %reason, "Storage unavailable at shutdown, closing anyway");
        }

        if timeout_at(deadline, self.pool.close()).await.is_err() {
            let stats = self.pool.stats();
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                open_connections = stats.size,
                "Storage pool did not close in time, connections may leak until exit"
            );
            return PhaseReport::timed_out(0, 1).with_detail("leak risk: pool close timed out");
        }

        tracing::info!("Storage pool closed");
        match probe {
            Ok(()) => PhaseReport::completed(1),
            Err(reason) => PhaseReport {
                outcome: PhaseOutcome::Degraded,
                completed: 1,
                abandoned: 0,
                detail: Some(format!("storage unavailable: {reason}")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::storage::pool::SqliteStorage;

    #[tokio::test]
    async fn closes_idle_pool() {
        let config = StorageConfig {
            database_url: "sqlite::memory:".to_string(),
            ..StorageConfig::default()
        };
        let storage = Arc::new(SqliteStorage::connect(&config).await.unwrap());

        let report = StorageTeardown::new(storage.clone())
            .run(Duration::from_secs(2))
            .await;
        assert_eq!(report.outcome, PhaseOutcome::Completed);
        assert!(storage.is_closed());
    }

    #[tokio::test]
    async fn held_connection_times_out_close() {
        let config = StorageConfig {
            database_url: "sqlite::memory:".to_string(),
            ..StorageConfig::default()
        };
        let storage = Arc::new(SqliteStorage::connect(&config).await.unwrap());
        let _held = storage.pool().acquire().await.unwrap();

        let started = std::time::Instant::now();
        let report = StorageTeardown::new(storage).run(Duration::from_millis(300)).await;

        assert_eq!(report.outcome, PhaseOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
