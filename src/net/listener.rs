//! Listening socket setup.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Hand out a std listener whose clones are shared by the workers
//!
//! # Design Decisions
//! - The socket is bound once, before any worker starts, so a bad address
//!   fails startup instead of a single worker

use std::net::{SocketAddr, TcpListener};

use thiserror::Error;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the shared listening socket.
pub fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let address: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|source| ListenerError::Address {
            address: config.bind_address.clone(),
            source,
        })?;

    let listener = TcpListener::bind(address).map_err(|source| ListenerError::Bind { address, source })?;

    match listener.local_addr() {
        Ok(local) => tracing::info!(address = %local, workers = config.workers, "Listener bound"),
        Err(e) => tracing::warn!(error = %e, "Listener bound, local address unknown"),
    }
    Ok(listener)
}
