//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{CacheKind, LogFormat, ServiceConfig, ShutdownSettings};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    load_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit variable lookup.
pub fn load_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay recognised environment variables onto `config`.
pub fn apply_env_overrides(
    config: &mut ServiceConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let host = lookup("SERVER_HOST");
    let port = lookup("SERVER_PORT");
    if host.is_some() || port.is_some() {
        let (current_host, current_port) = config
            .listener
            .bind_address
            .rsplit_once(':')
            .unwrap_or(("0.0.0.0", "8080"));
        let host = host.unwrap_or_else(|| current_host.to_string());
        let port = match port {
            Some(port) => parse::<u16>("SERVER_PORT", port)?.to_string(),
            None => current_port.to_string(),
        };
        config.listener.bind_address = format!("{host}:{port}");
    }

    if let Some(url) = lookup("DATABASE_URL") {
        config.storage.database_url = url;
    }
    if let Some(url) = lookup("REDIS_URL") {
        config.cache.backend = CacheKind::Redis;
        config.cache.url = url;
    }

    let storage = &mut config.storage;
    if let Some(v) = lookup("DB_POOL_MAX_CONNECTIONS") {
        storage.max_connections = parse("DB_POOL_MAX_CONNECTIONS", v)?;
    }
    if let Some(v) = lookup("DB_POOL_MIN_CONNECTIONS") {
        storage.min_connections = parse("DB_POOL_MIN_CONNECTIONS", v)?;
    }
    if let Some(v) = lookup("DB_POOL_CONNECT_TIMEOUT_SECONDS") {
        storage.connect_timeout_secs = parse("DB_POOL_CONNECT_TIMEOUT_SECONDS", v)?;
    }
    if let Some(v) = lookup("DB_POOL_IDLE_TIMEOUT_SECONDS") {
        storage.idle_timeout_secs = parse("DB_POOL_IDLE_TIMEOUT_SECONDS", v)?;
    }
    if let Some(v) = lookup("DB_POOL_MAX_LIFETIME_SECONDS") {
        storage.max_lifetime_secs = parse("DB_POOL_MAX_LIFETIME_SECONDS", v)?;
    }
    if let Some(v) = lookup("DB_SLOW_QUERY_MS") {
        storage.slow_statement_ms = parse("DB_SLOW_QUERY_MS", v)?;
    }
    if let Some(v) = lookup("DB_LOG_LEVEL") {
        storage.statement_log_level = v;
    }
    if let Some(env) = lookup("RUST_ENV") {
        storage.log_all_statements = env.eq_ignore_ascii_case("development");
    }

    if let Some(v) = lookup("LOG_FORMAT") {
        config.observability.log_format = LogFormat::from_str(&v)
            .map_err(|_| ConfigError::InvalidEnv { key: "LOG_FORMAT", value: v })?;
    }

    apply_shutdown_overrides(&mut config.shutdown, &lookup)
}

/// Overlay the `SHUTDOWN_*` variables. Values must be unsigned integers;
/// zero passes here and is rejected by validation.
pub(crate) fn apply_shutdown_overrides(
    settings: &mut ShutdownSettings,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = lookup("SHUTDOWN_GRACEFUL_TIMEOUT") {
        settings.graceful_timeout_secs = parse("SHUTDOWN_GRACEFUL_TIMEOUT", v)?;
    }
    if let Some(v) = lookup("SHUTDOWN_BACKGROUND_TIMEOUT") {
        settings.background_timeout_secs = parse("SHUTDOWN_BACKGROUND_TIMEOUT", v)?;
    }
    if let Some(v) = lookup("SHUTDOWN_DB_TIMEOUT") {
        settings.db_timeout_secs = parse("SHUTDOWN_DB_TIMEOUT", v)?;
    }
    Ok(())
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = load_with(None, env(&[])).unwrap();
        assert_eq!(config.shutdown.graceful_timeout_secs, 30);
        assert_eq!(config.shutdown.background_timeout_secs, 10);
        assert_eq!(config.shutdown.db_timeout_secs, 5);
    }

    #[test]
    fn env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:9000\"\n[shutdown]\ngraceful_timeout_secs = 20"
        )
        .unwrap();

        let config = load_with(
            Some(file.path()),
            env(&[
                ("SERVER_PORT", "9100"),
                ("SHUTDOWN_GRACEFUL_TIMEOUT", "7"),
                ("REDIS_URL", "redis://cache:6379"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9100");
        assert_eq!(config.shutdown.graceful_timeout_secs, 7);
        assert_eq!(config.cache.backend, CacheKind::Redis);
        assert_eq!(config.cache.url, "redis://cache:6379");
    }

    #[test]
    fn unparsable_shutdown_timeout_is_rejected() {
        let err = load_with(None, env(&[("SHUTDOWN_BACKGROUND_TIMEOUT", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { key: "SHUTDOWN_BACKGROUND_TIMEOUT", .. }
        ));
    }

    #[test]
    fn zero_shutdown_timeout_fails_validation() {
        let err = load_with(None, env(&[("SHUTDOWN_DB_TIMEOUT", "0")])).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn development_env_logs_all_statements() {
        let config = load_with(None, env(&[("RUST_ENV", "development")])).unwrap();
        assert!(config.storage.log_all_statements);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_with(Some(Path::new("/nonexistent/insights.toml")), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
