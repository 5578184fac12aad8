//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve the configured bind address
//! - Bind the listening socket before any subsystem starts serving

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Configured address is not a socket address.
    #[error("invalid bind address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    /// Failed to bind to address.
    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}

/// Bind to the configured address.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|source| ListenerError::Address {
            address: config.bind_address.clone(),
            source,
        })?;

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let config = ListenerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..ListenerConfig::default()
        };
        let listener = bind(&config).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn rejects_garbage_address() {
        let config = ListenerConfig {
            bind_address: "not-an-address".to_string(),
            ..ListenerConfig::default()
        };
        assert!(matches!(bind(&config).await, Err(ListenerError::Address { .. })));
    }
}
