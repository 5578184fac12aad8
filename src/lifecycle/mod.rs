//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Connect storage & cache → Start jobs → Start listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → coordinator.trigger()
//!
//! Shutdown (sequencer.rs):
//!     Running → Draining → BackgroundTeardown → ChannelTeardown
//!             → CacheTeardown → StorageTeardown → Complete
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, stop jobs, close channels, release backends
//! - Every phase has a deadline; a missed deadline is logged, never fatal
//! - Cancellation is cooperative; stuck tasks are abandoned, not aborted
//! - The runtime is released without joining abandoned tasks, so exit stays bounded

pub mod runtime;
pub mod sequencer;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod tasks;

pub use runtime::{build_runtime, run_until_complete};
pub use sequencer::{
    PhaseOutcome, PhaseReport, PhaseResult, ShutdownSequencer, ShutdownState, ShutdownSummary,
};
pub use shutdown::ShutdownCoordinator;
pub use signals::{ReceivedSignal, SignalError, SignalListener};
pub use startup::{Application, StartupError};
pub use tasks::{RegistryError, TaskRegistry, TaskReport};
