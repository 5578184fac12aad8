//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool bounds, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{CacheKind, ServiceConfig, ShutdownSettings};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: '{value}' is not a valid socket address")]
    Address { field: &'static str, value: String },

    #[error("storage.min_connections ({min}) exceeds storage.max_connections ({max})")]
    PoolBounds { min: u32, max: u32 },

    #[error("{field}: unknown log level '{value}'")]
    LogLevel { field: &'static str, value: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_shutdown(&config.shutdown);

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "listener.request_timeout_secs" });
    }

    if config.cache.backend == CacheKind::Redis && config.cache.url.is_empty() {
        errors.push(ValidationError::Empty { field: "cache.url" });
    }

    let storage = &config.storage;
    if storage.database_url.is_empty() {
        errors.push(ValidationError::Empty { field: "storage.database_url" });
    }
    if storage.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "storage.max_connections" });
    }
    if storage.min_connections > storage.max_connections {
        errors.push(ValidationError::PoolBounds {
            min: storage.min_connections,
            max: storage.max_connections,
        });
    }
    if storage.statement_log_level.parse::<log::LevelFilter>().is_err() {
        errors.push(ValidationError::LogLevel {
            field: "storage.statement_log_level",
            value: storage.statement_log_level.clone(),
        });
    }

    let jobs = &config.jobs;
    if jobs.enabled {
        for (field, value) in [
            ("jobs.storage_heartbeat_secs", jobs.storage_heartbeat_secs),
            ("jobs.cache_stats_secs", jobs.cache_stats_secs),
            ("jobs.channel_heartbeat_secs", jobs.channel_heartbeat_secs),
        ] {
            if value == 0 {
                errors.push(ValidationError::Zero { field });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Every shutdown budget must be positive.
pub fn validate_shutdown(settings: &ShutdownSettings) -> Vec<ValidationError> {
    [
        ("shutdown.graceful_timeout_secs", settings.graceful_timeout_secs),
        ("shutdown.background_timeout_secs", settings.background_timeout_secs),
        ("shutdown.db_timeout_secs", settings.db_timeout_secs),
    ]
    .into_iter()
    .filter(|(_, value)| *value == 0)
    .map(|(field, _)| ValidationError::Zero { field })
    .collect()
}
