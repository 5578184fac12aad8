//! Cooperative periodic runner.
//!
//! Every built-in job is a loop that waits on two sources at once: the next
//! tick and the shutdown notification. A tick that is already running is
//! allowed to finish; the loop exits before starting another.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Run `tick` every `period` until `shutdown` fires.
///
/// The first tick happens one full period after start. Returns the number
/// of ticks executed.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut tick: F,
) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(task = name, interval_ms = period.as_millis() as u64, "Background job starting");

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            biased;
            // A closed channel means the coordinator is gone; treat it as shutdown.
            _ = shutdown.recv() => {
                tracing::info!(task = name, ticks, "Background job received shutdown signal, exiting loop");
                break;
            }
            _ = ticker.tick() => {
                ticks += 1;
                tick().await;
            }
        }
    }
    ticks
}
