//! Network utility functions
//!
//! This module provides utility functions for network operations.

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use super::error::{ProxyError, Result};

/// Parse a socket address
///
/// Literal `ip:port` forms are tried first, then name resolution, so
/// `localhost:1081` is accepted as well.
///
/// # Arguments
///
/// * `addr` - The address string to parse
///
/// # Returns
///
/// The parsed `SocketAddr`
pub fn parse_socket_addr(addr: &str) -> Result<SocketAddr> {
    if let Ok(socket_addr) = SocketAddr::from_str(addr) {
        return Ok(socket_addr);
    }

    match addr.to_socket_addrs() {
        Ok(mut addrs) => addrs
            .next()
            .ok_or_else(|| ProxyError::Config(format!("Failed to parse address: {}", addr))),
        Err(e) => Err(ProxyError::Config(format!(
            "Failed to parse address {}: {}",
            addr, e
        ))),
    }
}
