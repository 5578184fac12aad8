//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (phase, task, duration_ms)
//!     → logging.rs (EnvFilter + pretty or JSON formatter)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID attached to every HTTP span by the router layers
//! - Shutdown phases log one entry line and one result line each

pub mod logging;

pub use logging::init_logging;
