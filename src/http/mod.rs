//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, trace, timeout, in-flight guard)
//!     → /health          shutdown-aware liveness
//!     → /api/cache/stats cache counters
//!     → /ws              websocket.rs (realtime subscriber)
//! ```

pub mod server;
pub mod websocket;

pub use server::{build_router, AppState};
