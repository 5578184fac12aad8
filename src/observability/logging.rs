//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber once, at process start
//! - Select the JSON or pretty formatter from configuration
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the built-in default filter
//! - JSON format for production, pretty format for development

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "insights_backend=info,tower_http=info";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails_instead_of_panicking() {
        // The first call may lose to another test in this binary.
        let _ = init_logging(LogFormat::Pretty);
        assert!(init_logging(LogFormat::Json).is_err());
    }
}
