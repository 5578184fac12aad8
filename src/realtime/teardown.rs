//! Realtime channel teardown phase.

use std::sync::Arc;
use std::time::Duration;

use crate::lifecycle::sequencer::{PhaseOutcome, PhaseReport};
use crate::realtime::hub::{ChannelEvent, ChannelRegistry};

/// Time subscribers get to receive the terminal notice before their
/// connections are closed.
pub const CHANNEL_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Reason carried by the terminal notice.
pub const SHUTDOWN_NOTICE_REASON: &str = "server shutting down";

/// Notifies, waits, then closes every realtime subscriber.
pub struct ChannelTeardown {
    registry: Arc<dyn ChannelRegistry>,
}

impl ChannelTeardown {
    pub fn new(registry: Arc<dyn ChannelRegistry>) -> Self {
        Self { registry }
    }

    /// Notify → wait → close, in that order.
    pub async fn run(self) -> PhaseReport {
        let open = self.registry.subscribers().len();
        if open == 0 {
            tracing::info!("No realtime subscribers connected");
            return PhaseReport::completed(0);
        }

        let notified = self.registry.notify_terminal(&ChannelEvent::ServerShutdown {
            reason: SHUTDOWN_NOTICE_REASON.to_string(),
        });
        tracing::info!(
            subscribers = open,
            notified,
            grace_ms = CHANNEL_GRACE_PERIOD.as_millis() as u64,
            "Terminal notice sent to realtime subscribers"
        );

        tokio::time::sleep(CHANNEL_GRACE_PERIOD).await;

        let closed = self.registry.close_all();
        tracing::info!(closed, "Realtime subscribers closed");

        if notified < open {
            let missed = open - notified;
            tracing::warn!(missed, "Some realtime subscribers closed without the terminal notice");
            return PhaseReport {
                outcome: PhaseOutcome::Degraded,
                completed: closed,
                abandoned: 0,
                detail: Some(format!("{missed} subscriber(s) missed the notice")),
            };
        }
        PhaseReport::completed(closed)
    }
}
