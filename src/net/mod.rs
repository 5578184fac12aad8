//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind configured address)
//!     → connection.rs (in-flight request accounting)
//!     → Hand off to HTTP layer
//!
//! On shutdown (drain.rs):
//!     stop accepting → wait for in-flight requests → resolve or time out
//! ```
//!
//! # Design Decisions
//! - Each request tracked so a timed-out drain can report what it abandoned
//! - Upgraded (WebSocket) connections are released to the realtime hub and
//!   are closed by the channel teardown, not by the drain

pub mod connection;
pub mod drain;
pub mod listener;
