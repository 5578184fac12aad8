//! Connection drain controller.
//!
//! # Responsibilities
//! - Serve HTTP on the bound listener until shutdown is notified
//! - Stop accepting the moment the notification arrives
//! - Let accepted requests finish, bounded by the drain timeout
//!
//! # Design Decisions
//! - Built on axum's graceful shutdown: the accept loop ends when the
//!   shutdown future resolves, then open connections are drained
//! - Requests still running at the deadline are abandoned; their
//!   responses are lost and the count is reported in the phase result

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::sequencer::PhaseReport;
use crate::net::connection::InflightTracker;

/// A running server that drains on shutdown.
pub struct DrainHandle {
    handle: JoinHandle<std::io::Result<()>>,
    tracker: InflightTracker,
    inflight_at_signal: Arc<AtomicU64>,
    local_addr: SocketAddr,
}

/// Start serving `router` on `listener` until `shutdown` fires.
///
/// `shutdown` must be subscribed before this call; it is consumed by the
/// server's graceful-shutdown future.
pub fn spawn(
    listener: TcpListener,
    router: Router,
    tracker: InflightTracker,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<DrainHandle> {
    let local_addr = listener.local_addr()?;
    let inflight_at_signal = Arc::new(AtomicU64::new(0));

    let signal_tracker = tracker.clone();
    let signal_count = Arc::clone(&inflight_at_signal);
    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                let inflight = signal_tracker.active_count();
                signal_count.store(inflight, Ordering::SeqCst);
                tracing::info!(
                    in_flight = inflight,
                    "Server received shutdown signal, no longer accepting connections"
                );
            })
            .await
    });

    tracing::info!(address = %local_addr, "HTTP server started");
    Ok(DrainHandle {
        handle,
        tracker,
        inflight_at_signal,
        local_addr,
    })
}

impl DrainHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for in-flight requests to finish, at most `timeout`.
    pub async fn drain(self, timeout: Duration) -> PhaseReport {
        let result = tokio::time::timeout(timeout, self.handle).await;
        let at_signal = self.inflight_at_signal.load(Ordering::SeqCst);

        match result {
            Ok(Ok(Ok(()))) => {
                tracing::info!(drained = at_signal, "Server drained all in-flight requests");
                PhaseReport::completed(at_signal as usize)
            }
            Ok(Ok(Err(e))) => {
                tracing::error!(error = %e, "Server stopped with an error");
                PhaseReport::degraded(format!("server error: {e}"))
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Server task failed");
                PhaseReport::degraded(format!("server task failed: {e}"))
            }
            Err(_) => {
                let abandoned = self.tracker.active_count();
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    abandoned_requests = abandoned,
                    "Server did not drain in time, abandoning in-flight requests"
                );
                PhaseReport::timed_out(
                    at_signal.saturating_sub(abandoned) as usize,
                    abandoned as usize,
                )
            }
        }
    }
}
