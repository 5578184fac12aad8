//! Shutdown sequencer.
//!
//! # States
//! ```text
//! Running → Draining → BackgroundTeardown → ChannelTeardown
//!         → CacheTeardown → StorageTeardown → Complete
//! ```
//!
//! # Design Decisions
//! - Transitions are linear and unconditional; a failed or timed-out
//!   phase never skips the next one
//! - Each phase is entered only after the previous phase's bounded wait
//!   resolved, so phases never overlap
//! - Phases capture their own failures as a [`PhaseReport`]; nothing
//!   raised during teardown is fatal
//! - `Complete` is terminal and emits the [`ShutdownSummary`]

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use crate::cache::{CacheBackend, CacheTeardown};
use crate::config::ShutdownConfig;
use crate::lifecycle::shutdown::ShutdownCoordinator;
use crate::lifecycle::tasks::TaskRegistry;
use crate::net::drain::DrainHandle;
use crate::realtime::{ChannelRegistry, ChannelTeardown};
use crate::storage::{StoragePool, StorageTeardown};

/// Lifecycle state of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownState {
    Running,
    Draining,
    BackgroundTeardown,
    ChannelTeardown,
    CacheTeardown,
    StorageTeardown,
    Complete,
}

impl ShutdownState {
    /// Teardown phases in execution order.
    pub const PHASES: [ShutdownState; 5] = [
        ShutdownState::Draining,
        ShutdownState::BackgroundTeardown,
        ShutdownState::ChannelTeardown,
        ShutdownState::CacheTeardown,
        ShutdownState::StorageTeardown,
    ];

    /// The only successor of this state. `Complete` has none.
    pub fn next(self) -> Option<ShutdownState> {
        match self {
            ShutdownState::Running => Some(ShutdownState::Draining),
            ShutdownState::Draining => Some(ShutdownState::BackgroundTeardown),
            ShutdownState::BackgroundTeardown => Some(ShutdownState::ChannelTeardown),
            ShutdownState::ChannelTeardown => Some(ShutdownState::CacheTeardown),
            ShutdownState::CacheTeardown => Some(ShutdownState::StorageTeardown),
            ShutdownState::StorageTeardown => Some(ShutdownState::Complete),
            ShutdownState::Complete => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownState::Running => "running",
            ShutdownState::Draining => "draining",
            ShutdownState::BackgroundTeardown => "background_teardown",
            ShutdownState::ChannelTeardown => "channel_teardown",
            ShutdownState::CacheTeardown => "cache_teardown",
            ShutdownState::StorageTeardown => "storage_teardown",
            ShutdownState::Complete => "complete",
        }
    }
}

impl std::fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    Completed,
    TimedOut,
    Degraded,
}

impl std::fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseOutcome::Completed => write!(f, "completed"),
            PhaseOutcome::TimedOut => write!(f, "timed_out"),
            PhaseOutcome::Degraded => write!(f, "degraded"),
        }
    }
}

/// What a phase reports back to the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub outcome: PhaseOutcome,
    /// Units of work that finished (requests, tasks, connections, pools).
    pub completed: usize,
    /// Units no longer waited on.
    pub abandoned: usize,
    pub detail: Option<String>,
}

impl PhaseReport {
    pub fn completed(units: usize) -> Self {
        Self {
            outcome: PhaseOutcome::Completed,
            completed: units,
            abandoned: 0,
            detail: None,
        }
    }

    pub fn timed_out(completed: usize, abandoned: usize) -> Self {
        Self {
            outcome: PhaseOutcome::TimedOut,
            completed,
            abandoned,
            detail: None,
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            outcome: PhaseOutcome::Degraded,
            completed: 0,
            abandoned: 0,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Timed record of one executed phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseResult {
    pub phase: ShutdownState,
    /// Wall-clock start.
    pub started_at: SystemTime,
    /// Start relative to the beginning of the shutdown sequence.
    pub offset: Duration,
    pub duration: Duration,
    pub outcome: PhaseOutcome,
    pub completed: usize,
    pub abandoned: usize,
    pub detail: Option<String>,
}

impl PhaseResult {
    /// Offset at which the phase's wait resolved.
    pub fn finished_offset(&self) -> Duration {
        self.offset + self.duration
    }
}

/// Ordered phase results plus total elapsed time.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownSummary {
    pub phases: Vec<PhaseResult>,
    pub total: Duration,
}

impl ShutdownSummary {
    pub fn phase(&self, state: ShutdownState) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.phase == state)
    }

    /// True when every phase completed.
    pub fn is_clean(&self) -> bool {
        self.phases
            .iter()
            .all(|p| p.outcome == PhaseOutcome::Completed)
    }

    /// Emit the summary as log lines.
    pub fn log(&self) {
        for result in &self.phases {
            tracing::info!(
                phase = %result.phase,
                outcome = %result.outcome,
                duration_ms = result.duration.as_millis() as u64,
                completed = result.completed,
                abandoned = result.abandoned,
                detail = result.detail.as_deref().unwrap_or(""),
                "Shutdown phase summary"
            );
        }
        let timed_out = self
            .phases
            .iter()
            .filter(|p| p.outcome == PhaseOutcome::TimedOut)
            .count();
        let degraded = self
            .phases
            .iter()
            .filter(|p| p.outcome == PhaseOutcome::Degraded)
            .count();
        tracing::info!(
            total_ms = self.total.as_millis() as u64,
            phases = self.phases.len(),
            timed_out,
            degraded,
            "Shutdown complete"
        );
    }
}

/// Drives the teardown phases in fixed order.
pub struct ShutdownSequencer {
    coordinator: ShutdownCoordinator,
    state: ShutdownState,
    server: Option<DrainHandle>,
    tasks: Option<Arc<TaskRegistry>>,
    channels: Option<ChannelTeardown>,
    cache: Option<CacheTeardown>,
    storage: Option<StorageTeardown>,
}

impl ShutdownSequencer {
    /// Create a sequencer with no attached subsystems.
    ///
    /// Phases without a subsystem still run and report zero units.
    pub fn new(coordinator: ShutdownCoordinator) -> Self {
        Self {
            coordinator,
            state: ShutdownState::Running,
            server: None,
            tasks: None,
            channels: None,
            cache: None,
            storage: None,
        }
    }

    pub fn with_server(mut self, server: DrainHandle) -> Self {
        self.server = Some(server);
        self
    }

    pub fn with_tasks(mut self, tasks: Arc<TaskRegistry>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn with_channels(mut self, registry: Arc<dyn ChannelRegistry>) -> Self {
        self.channels = Some(ChannelTeardown::new(registry));
        self
    }

    pub fn with_cache(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(CacheTeardown::new(backend));
        self
    }

    pub fn with_storage(mut self, pool: Arc<dyn StoragePool>) -> Self {
        self.storage = Some(StorageTeardown::new(pool));
        self
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Run every phase and return the summary.
    ///
    /// Publishes the shutdown signal first (a no-op if it already fired).
    /// Returns within the sum of the configured timeouts plus the fixed
    /// channel grace period.
    pub async fn run(mut self, config: ShutdownConfig) -> ShutdownSummary {
        self.coordinator.trigger();

        let sequence_start = Instant::now();
        let mut phases = Vec::with_capacity(ShutdownState::PHASES.len());

        while let Some(next) = self.state.next() {
            self.state = next;
            if next == ShutdownState::Complete {
                break;
            }

            let step = phases.len() + 1;
            tracing::info!(
                phase = %next,
                step,
                of = ShutdownState::PHASES.len(),
                "Entering shutdown phase"
            );

            let started_at = SystemTime::now();
            let phase_start = Instant::now();
            let report = self.run_phase(next, &config).await;
            let duration = phase_start.elapsed();

            match report.outcome {
                PhaseOutcome::Completed => tracing::info!(
                    phase = %next,
                    duration_ms = duration.as_millis() as u64,
                    completed = report.completed,
                    "Shutdown phase completed"
                ),
                outcome => tracing::warn!(
                    phase = %next,
                    outcome = %outcome,
                    duration_ms = duration.as_millis() as u64,
                    completed = report.completed,
                    abandoned = report.abandoned,
                    detail = report.detail.as_deref().unwrap_or(""),
                    "Shutdown phase did not complete cleanly, continuing"
                ),
            }

            phases.push(PhaseResult {
                phase: next,
                started_at,
                offset: phase_start.duration_since(sequence_start),
                duration,
                outcome: report.outcome,
                completed: report.completed,
                abandoned: report.abandoned,
                detail: report.detail,
            });
        }

        let summary = ShutdownSummary {
            phases,
            total: sequence_start.elapsed(),
        };
        summary.log();
        summary
    }

    async fn run_phase(&mut self, phase: ShutdownState, config: &ShutdownConfig) -> PhaseReport {
        match phase {
            ShutdownState::Draining => match self.server.take() {
                Some(server) => server.drain(config.listener_drain_timeout).await,
                None => PhaseReport::completed(0),
            },
            ShutdownState::BackgroundTeardown => match self.tasks.take() {
                Some(tasks) => {
                    let report = tasks.await_all(config.background_task_timeout).await;
                    if !report.abandoned.is_empty() {
                        PhaseReport::timed_out(report.completed.len(), report.abandoned.len())
                            .with_detail(format!("abandoned: {}", report.abandoned.join(", ")))
                    } else if !report.failed.is_empty() {
                        PhaseReport {
                            outcome: PhaseOutcome::Degraded,
                            completed: report.completed.len(),
                            abandoned: 0,
                            detail: Some(format!("failed: {}", report.failed.join(", "))),
                        }
                    } else {
                        PhaseReport::completed(report.completed.len())
                    }
                }
                None => PhaseReport::completed(0),
            },
            ShutdownState::ChannelTeardown => match self.channels.take() {
                Some(channels) => channels.run().await,
                None => PhaseReport::completed(0),
            },
            ShutdownState::CacheTeardown => match self.cache.take() {
                Some(cache) => cache.run(config.cache_timeout).await,
                None => PhaseReport::completed(0),
            },
            ShutdownState::StorageTeardown => match self.storage.take() {
                Some(storage) => storage.run(config.storage_timeout).await,
                None => PhaseReport::completed(0),
            },
            ShutdownState::Running | ShutdownState::Complete => PhaseReport::completed(0),
        }
    }
}
