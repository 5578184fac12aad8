//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start the built-in background jobs
//! - Bind the listener and begin accepting traffic
//! - Hand every owned resource to the shutdown sequencer
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::{self, CacheBackend, CacheError};
use crate::config::{ServiceConfig, ShutdownConfig};
use crate::http::{build_router, AppState};
use crate::jobs::{register_builtin_jobs, JobDependencies};
use crate::lifecycle::sequencer::{ShutdownSequencer, ShutdownSummary};
use crate::lifecycle::shutdown::ShutdownCoordinator;
use crate::lifecycle::tasks::{RegistryError, TaskRegistry};
use crate::net::connection::InflightTracker;
use crate::net::drain::{self, DrainHandle};
use crate::net::listener::{self, ListenerError};
use crate::realtime::ChannelHub;
use crate::storage::{SqliteStorage, StorageError, StoragePool};

/// Fatal errors before the service starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("cache: {0}")]
    Cache(#[from] CacheError),

    #[error("listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("background jobs: {0}")]
    Registry(#[from] RegistryError),

    #[error("server: {0}")]
    Serve(#[source] std::io::Error),
}

/// A running service and every resource its shutdown must release.
pub struct Application {
    coordinator: ShutdownCoordinator,
    shutdown: ShutdownConfig,
    server: DrainHandle,
    tasks: Arc<TaskRegistry>,
    hub: Arc<ChannelHub>,
    cache: Arc<dyn CacheBackend>,
    storage: Arc<dyn StoragePool>,
}

impl Application {
    /// Connect to storage and cache, then start serving.
    pub async fn start(
        config: ServiceConfig,
        coordinator: ShutdownCoordinator,
    ) -> Result<Self, StartupError> {
        let storage: Arc<dyn StoragePool> = Arc::new(SqliteStorage::connect(&config.storage).await?);
        let cache = cache::connect(&config.cache).await?;
        Self::start_with(config, coordinator, storage, cache).await
    }

    /// Start serving with already-constructed storage and cache handles.
    pub async fn start_with(
        config: ServiceConfig,
        coordinator: ShutdownCoordinator,
        storage: Arc<dyn StoragePool>,
        cache: Arc<dyn CacheBackend>,
    ) -> Result<Self, StartupError> {
        let hub = Arc::new(ChannelHub::new());
        let tasks = Arc::new(TaskRegistry::new(coordinator.clone()));

        register_builtin_jobs(
            &tasks,
            &config.jobs,
            JobDependencies {
                storage: Arc::clone(&storage),
                cache: Arc::clone(&cache),
                channels: hub.clone(),
            },
        )?;

        let tracker = InflightTracker::new();
        let state = AppState {
            coordinator: coordinator.clone(),
            hub: Arc::clone(&hub),
            cache: Arc::clone(&cache),
        };
        let router = build_router(&config.listener, state, tracker.clone());

        let listener = listener::bind(&config.listener).await?;
        let server = drain::spawn(listener, router, tracker, coordinator.subscribe())
            .map_err(StartupError::Serve)?;

        let shutdown = ShutdownConfig::from(&config.shutdown);
        tracing::info!(
            address = %server.local_addr(),
            background_tasks = tasks.len(),
            drain_timeout_secs = shutdown.listener_drain_timeout.as_secs(),
            background_timeout_secs = shutdown.background_task_timeout.as_secs(),
            db_timeout_secs = shutdown.storage_timeout.as_secs(),
            "Service started"
        );

        Ok(Self {
            coordinator,
            shutdown,
            server,
            tasks,
            hub,
            cache,
            storage,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    /// Registry for additional background work.
    pub fn tasks(&self) -> &Arc<TaskRegistry> {
        &self.tasks
    }

    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    pub fn shutdown_config(&self) -> ShutdownConfig {
        self.shutdown
    }

    /// Run the full shutdown sequence with the configured budgets.
    pub async fn shutdown(self) -> ShutdownSummary {
        let config = self.shutdown;
        self.shutdown_with(config).await
    }

    /// Run the full shutdown sequence with explicit budgets.
    pub async fn shutdown_with(self, config: ShutdownConfig) -> ShutdownSummary {
        ShutdownSequencer::new(self.coordinator)
            .with_server(self.server)
            .with_tasks(self.tasks)
            .with_channels(self.hub)
            .with_cache(self.cache)
            .with_storage(self.storage)
            .run(config)
            .await
    }
}
