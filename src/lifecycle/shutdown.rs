//! Shutdown coordination for the service.
//!
//! # Responsibilities
//! - Own the one-to-many shutdown notification
//! - Publish it at most once per process lifetime
//!
//! # Design Decisions
//! - Backed by a `broadcast` channel: a receiver only observes values sent
//!   after it subscribed, so late subscribers never see the notification
//! - A flag guards the single send, so repeated triggers are silent no-ops

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks subscribe to
/// before entering their main loop. Cloning yields another handle to the
/// same coordinator.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    /// Set by the first trigger.
    triggered: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown signal.
    ///
    /// Must be called before the subscriber enters its main loop. A receiver
    /// created after [`trigger`](Self::trigger) never receives anything.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    ///
    /// Only the first call publishes; later calls do nothing.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let delivered = self.tx.send(()).unwrap_or(0);
            tracing::info!(subscribers = delivered, "Shutdown signal published");
        } else {
            tracing::debug!("Shutdown already triggered, ignoring");
        }
    }

    /// Whether the signal has been published.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Get the number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
