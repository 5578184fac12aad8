//! Process runtime with a bounded exit.
//!
//! Dropping a multi-thread runtime waits for every worker thread. A task
//! abandoned by the shutdown sequence may be stuck in synchronous code, so
//! the runtime is released in the background once the main future is done.

use std::future::Future;

use tokio::runtime::{Builder, Runtime};

/// Multi-thread runtime with IO and timers enabled.
pub fn build_runtime() -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .enable_all()
        .thread_name("insights-worker")
        .build()
}

/// Drive `future` to completion, then release `runtime` without waiting
/// for tasks that are still running.
pub fn run_until_complete<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    output
}
