//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind the configured host and port
//! - Report the address actually bound (port 0 picks one)
//! - Graceful handling of bind errors

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;
use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Host is not an IP address.
    #[error("Invalid bind host `{0}'")]
    InvalidHost(String),

    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind `host:port` on the current runtime.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let ip: IpAddr = host
        .parse()
        .map_err(|_| ListenerError::InvalidHost(host.to_string()))?;
    let addr = SocketAddr::new(ip, port);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| ListenerError::Bind { addr, source })?;

    tracing::info!(
        address = %local_addr,
        requested_port = port,
        "Listener bound"
    );

    Ok(listener)
}
