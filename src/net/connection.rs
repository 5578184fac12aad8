//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently being served
//! - Report how many were still running when a drain deadline expired
//!
//! # Design Decisions
//! - RAII guard decrements on drop, so a panicking handler still releases its slot
//! - Counter is a plain atomic; only the value at the drain deadline matters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

/// Global atomic counter for request sequence numbers.
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Tracks in-flight requests for the drain phase.
#[derive(Debug, Clone, Default)]
pub struct InflightTracker {
    active: Arc<AtomicU64>,
}

impl InflightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new in-flight request. Returns a guard that decrements on drop.
    pub fn track(&self) -> InflightGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        InflightGuard {
            active: Arc::clone(&self.active),
            seq: REQUEST_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Current in-flight request count.
    pub fn active_count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

/// Guard held for the lifetime of one request.
#[derive(Debug)]
pub struct InflightGuard {
    active: Arc<AtomicU64>,
    seq: u64,
}

impl InflightGuard {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(request_seq = self.seq, "Request finished");
    }
}

/// Middleware that holds an [`InflightGuard`] while the inner service runs.
pub async fn track_inflight(
    State(tracker): State<InflightTracker>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let _guard = tracker.track();
    next.run(request).await
}
