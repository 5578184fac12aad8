//! OS signal handling.
//!
//! # Responsibilities
//! - Install termination handlers at process start
//! - Resolve once on the first termination or interrupt request
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are installed eagerly so a failure aborts startup instead of
//!   surfacing after the service is already serving
//! - On Unix, SIGTERM and SIGINT are raced; elsewhere Ctrl+C is the only channel

use thiserror::Error;

/// Signal handling could not be installed.
#[derive(Debug, Error)]
#[error("failed to install {signal} handler: {source}")]
pub struct SignalError {
    signal: &'static str,
    #[source]
    source: std::io::Error,
}

/// Which termination request arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceivedSignal {
    /// SIGTERM (process managers, containers).
    Terminate,
    /// SIGINT / Ctrl+C.
    Interrupt,
}

impl std::fmt::Display for ReceivedSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceivedSignal::Terminate => write!(f, "SIGTERM"),
            ReceivedSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Installed termination handlers.
pub struct SignalListener {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl SignalListener {
    /// Install the handlers. Must run inside a Tokio runtime.
    #[cfg(unix)]
    pub fn install() -> Result<Self, SignalError> {
        use tokio::signal::unix::{signal, SignalKind};

        let terminate = signal(SignalKind::terminate()).map_err(|source| SignalError {
            signal: "SIGTERM",
            source,
        })?;
        let interrupt = signal(SignalKind::interrupt()).map_err(|source| SignalError {
            signal: "SIGINT",
            source,
        })?;

        tracing::debug!("SIGTERM and SIGINT handlers installed");
        Ok(Self {
            terminate,
            interrupt,
        })
    }

    /// Install the handlers. Must run inside a Tokio runtime.
    #[cfg(windows)]
    pub fn install() -> Result<Self, SignalError> {
        let ctrl_c = tokio::signal::windows::ctrl_c().map_err(|source| SignalError {
            signal: "Ctrl+C",
            source,
        })?;
        tracing::debug!("Ctrl+C handler installed");
        Ok(Self { ctrl_c })
    }

    /// Wait for the first termination request.
    ///
    /// Consumes the listener, so it resolves at most once.
    #[cfg(unix)]
    pub async fn recv(mut self) -> ReceivedSignal {
        let received = tokio::select! {
            _ = self.terminate.recv() => ReceivedSignal::Terminate,
            _ = self.interrupt.recv() => ReceivedSignal::Interrupt,
        };
        tracing::info!(signal = %received, "Termination signal received");
        received
    }

    /// Wait for the first termination request.
    ///
    /// Consumes the listener, so it resolves at most once.
    #[cfg(windows)]
    pub async fn recv(mut self) -> ReceivedSignal {
        self.ctrl_c.recv().await;
        tracing::info!(signal = %ReceivedSignal::Interrupt, "Termination signal received");
        ReceivedSignal::Interrupt
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn install_succeeds_inside_runtime() {
        assert!(SignalListener::install().is_ok());
    }

    #[tokio::test]
    async fn recv_stays_pending_without_a_signal() {
        let listener = SignalListener::install().unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(50), listener.recv()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn signal_names() {
        assert_eq!(ReceivedSignal::Terminate.to_string(), "SIGTERM");
        assert_eq!(ReceivedSignal::Interrupt.to_string(), "SIGINT");
    }
}
