//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Per-phase shutdown budgets.
    pub shutdown: ShutdownSettings,

    /// Cache backend selection.
    pub cache: CacheConfig,

    /// Persistent storage pool.
    pub storage: StorageConfig,

    /// Built-in background jobs.
    pub jobs: JobsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout in seconds. WebSocket upgrades are not affected
    /// once the connection has switched protocols.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Shutdown budgets as they appear in the config file, in whole seconds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShutdownSettings {
    /// Connection drain budget.
    pub graceful_timeout_secs: u64,

    /// Background task budget.
    pub background_timeout_secs: u64,

    /// Budget for each of the cache and storage phases.
    pub db_timeout_secs: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            graceful_timeout_secs: 30,
            background_timeout_secs: 10,
            db_timeout_secs: 5,
        }
    }
}

/// Resolved per-phase deadlines handed to the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownConfig {
    pub listener_drain_timeout: Duration,
    pub background_task_timeout: Duration,
    pub cache_timeout: Duration,
    pub storage_timeout: Duration,
}

impl ShutdownConfig {
    /// Read the `SHUTDOWN_*` variables on top of the defaults.
    pub fn from_env() -> Result<Self, crate::config::ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, crate::config::ConfigError> {
        let mut settings = ShutdownSettings::default();
        crate::config::loader::apply_shutdown_overrides(&mut settings, &lookup)?;

        let errors = crate::config::validation::validate_shutdown(&settings);
        if !errors.is_empty() {
            return Err(crate::config::ConfigError::Validation(errors));
        }
        Ok(Self::from(&settings))
    }

    /// Upper bound on shutdown time, excluding the channel grace period.
    pub fn total_budget(&self) -> Duration {
        self.listener_drain_timeout
            + self.background_task_timeout
            + self.cache_timeout
            + self.storage_timeout
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self::from(&ShutdownSettings::default())
    }
}

impl From<&ShutdownSettings> for ShutdownConfig {
    fn from(settings: &ShutdownSettings) -> Self {
        let db = Duration::from_secs(settings.db_timeout_secs);
        Self {
            listener_drain_timeout: Duration::from_secs(settings.graceful_timeout_secs),
            background_task_timeout: Duration::from_secs(settings.background_timeout_secs),
            cache_timeout: db,
            storage_timeout: db,
        }
    }
}

/// Which cache backend to construct.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    #[default]
    Memory,
    Redis,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheKind,

    /// Redis URL, used when `backend = "redis"`.
    pub url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheKind::Memory,
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Storage pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite URL (e.g., "sqlite://insights.db").
    pub database_url: String,

    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,

    /// Log every statement at `statement_log_level` (development).
    pub log_all_statements: bool,

    /// Level for statement logging (off, error, warn, info, debug, trace).
    pub statement_log_level: String,

    /// Statements slower than this are logged at warn.
    pub slow_statement_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://insights.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            log_all_statements: false,
            statement_log_level: "debug".to_string(),
            slow_statement_ms: 1000,
        }
    }
}

/// Built-in background job settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Start the built-in jobs.
    pub enabled: bool,

    pub storage_heartbeat_secs: u64,
    pub cache_stats_secs: u64,
    pub channel_heartbeat_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_heartbeat_secs: 30,
            cache_stats_secs: 60,
            channel_heartbeat_secs: 15,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.shutdown, ShutdownSettings::default());
        assert_eq!(config.cache.backend, CacheKind::Memory);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn db_timeout_covers_cache_and_storage() {
        let settings = ShutdownSettings {
            graceful_timeout_secs: 12,
            background_timeout_secs: 4,
            db_timeout_secs: 3,
        };
        let config = ShutdownConfig::from(&settings);
        assert_eq!(config.listener_drain_timeout, Duration::from_secs(12));
        assert_eq!(config.background_task_timeout, Duration::from_secs(4));
        assert_eq!(config.cache_timeout, Duration::from_secs(3));
        assert_eq!(config.storage_timeout, Duration::from_secs(3));
        assert_eq!(config.total_budget(), Duration::from_secs(22));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [shutdown]
            background_timeout_secs = 2

            [cache]
            backend = "redis"
            url = "redis://cache:6379"
            "#,
        )
        .unwrap();
        assert_eq!(config.shutdown.background_timeout_secs, 2);
        assert_eq!(config.shutdown.graceful_timeout_secs, 30);
        assert_eq!(config.cache.backend, CacheKind::Redis);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
