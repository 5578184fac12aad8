//! Background task registry.
//!
//! # Responsibilities
//! - Spawn named long-running jobs with a shutdown receiver
//! - Wait for their cooperative exit under one shared deadline
//! - Record tasks that miss the deadline as abandoned
//!
//! # Design Decisions
//! - The receiver is subscribed before the task is spawned, so a task
//!   registered while `Running` can never miss the notification
//! - Abandoned tasks are detached, not aborted; they may keep running
//!   until the process exits

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::lifecycle::shutdown::ShutdownCoordinator;

/// Errors returned by [`TaskRegistry::register`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Shutdown has begun; new work is refused.
    #[error("task '{0}' rejected: shutdown in progress")]
    ShuttingDown(String),
}

/// A registered background task.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Logical task name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-task result of [`TaskRegistry::await_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Returned before the deadline.
    Completed,
    /// Panicked or was cancelled before the deadline.
    Failed(String),
    /// Still running at the deadline; no longer awaited.
    Abandoned,
}

/// Aggregated result of waiting on every registered task.
#[derive(Debug, Clone, Default)]
pub struct TaskReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub abandoned: Vec<String>,
}

impl TaskReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len() + self.abandoned.len()
    }
}

/// Registry of cooperative background tasks.
pub struct TaskRegistry {
    coordinator: ShutdownCoordinator,
    tasks: Mutex<Vec<TaskHandle>>,
}

impl TaskRegistry {
    pub fn new(coordinator: ShutdownCoordinator) -> Self {
        Self {
            coordinator,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `work` as a named background task.
    ///
    /// `work` receives its own shutdown receiver and must return promptly
    /// once it is notified.
    pub fn register<F, Fut>(&self, name: impl Into<String>, work: F) -> Result<(), RegistryError>
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        // Subscribe before checking the flag: trigger() sets the flag before it sends.
        let shutdown = self.coordinator.subscribe();
        if self.coordinator.is_triggered() {
            tracing::warn!(task = %name, "Rejecting task registration during shutdown");
            return Err(RegistryError::ShuttingDown(name));
        }

        let handle = tokio::spawn(work(shutdown));
        tracing::info!(task = %name, "Background task registered");

        self.lock().push(TaskHandle { name, handle });
        Ok(())
    }

    /// Number of tasks not yet awaited.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every registered task, bounded by a single deadline.
    ///
    /// Returns within `timeout` plus scheduling overhead. Each handle is
    /// consumed exactly once: awaited to completion or abandoned.
    pub async fn await_all(&self, timeout: Duration) -> TaskReport {
        let tasks = std::mem::take(&mut *self.lock());
        let deadline = Instant::now() + timeout;

        let waits = tasks.into_iter().map(|task| async move {
            let outcome = match tokio::time::timeout_at(deadline, task.handle).await {
                Ok(Ok(())) => TaskOutcome::Completed,
                Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
                // Dropping the JoinHandle detaches the task without aborting it.
                Err(_) => TaskOutcome::Abandoned,
            };
            (task.name, outcome)
        });

        let mut report = TaskReport::default();
        for (name, outcome) in join_all(waits).await {
            match outcome {
                TaskOutcome::Completed => {
                    tracing::debug!(task = %name, "Background task stopped");
                    report.completed.push(name);
                }
                TaskOutcome::Failed(reason) => {
                    tracing::error!(task = %name, error = %reason, "Background task failed");
                    report.failed.push(name);
                }
                TaskOutcome::Abandoned => {
                    tracing::warn!(
                        task = %name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Background task did not stop in time, abandoning"
                    );
                    report.abandoned.push(name);
                }
            }
        }
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TaskHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
