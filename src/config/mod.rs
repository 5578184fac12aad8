//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (SERVER_*, DATABASE_URL, REDIS_URL, DB_*, SHUTDOWN_*)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → ShutdownConfig derived for the sequencer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Bad values fail before any listener is bound

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, CacheKind, JobsConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ServiceConfig, ShutdownConfig, ShutdownSettings, StorageConfig,
};
pub use validation::ValidationError;
