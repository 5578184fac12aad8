//! Insights backend service library.
//!
//! HTTP and realtime API over SQLite storage and a Redis or in-memory cache,
//! with an ordered, deadline-bounded graceful shutdown.

pub mod cache;
pub mod config;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod realtime;
pub mod storage;

pub use config::schema::ServiceConfig;
pub use lifecycle::{Application, ShutdownCoordinator, ShutdownSequencer, ShutdownSummary};
