//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Kumasocks error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Configuration file unreadable, malformed or holding an invalid value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listening socket could not be bound
    #[error("Cannot listen on {addr}: {source}")]
    Listen {
        /// Address that was requested
        addr: String,
        /// Underlying bind failure
        #[source]
        source: io::Error,
    },

    /// Upstream proxy URL malformed or using an unsupported scheme
    #[error("Proxy configuration error: {0}")]
    ProxyConfig(String),

    /// Original destination could not be recovered for a connection
    #[error("Cannot resolve original destination: {0}")]
    Resolution(String),

    /// Upstream connection through the proxy could not be established
    #[error("Cannot dial {target} through proxy: {reason}")]
    Dial {
        /// Destination the client wanted to reach
        target: SocketAddr,
        /// Why the proxy or the destination refused
        reason: String,
    },

    /// A copy direction failed after both legs were connected
    #[error("Relay error: {0}")]
    Relay(#[source] io::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

impl ProxyError {
    /// Whether the error belongs to the startup phase and must stop the process.
    ///
    /// Everything else is scoped to a single connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Listen { .. } | Self::ProxyConfig(_)
        )
    }

    pub(crate) fn dial(target: SocketAddr, reason: impl ToString) -> Self {
        Self::Dial {
            target,
            reason: reason.to_string(),
        }
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
