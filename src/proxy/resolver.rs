//! Original destination recovery
//!
//! Connections redirected by a `REDIRECT`/`DNAT` rule land on the local
//! listener; the address the client actually dialed is kept by the kernel's
//! connection tracking and read back from the accepted socket.

use std::net::SocketAddr;
use tokio::net::TcpStream;

use crate::common::{ProxyError, Result};

/// Recovers the pre-redirection destination of an accepted connection
pub trait DestinationResolver: Send + Sync + 'static {
    /// Destination the client originally tried to reach
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Resolution` if the platform has no such mechanism,
    /// the socket carries no redirection state, or the query fails.
    fn resolve(&self, stream: &TcpStream) -> Result<SocketAddr>;
}

/// Resolver backed by netfilter's `SO_ORIGINAL_DST` socket option
#[cfg(any(target_os = "linux", target_os = "android"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct NetfilterResolver;

#[cfg(any(target_os = "linux", target_os = "android"))]
impl DestinationResolver for NetfilterResolver {
    fn resolve(&self, stream: &TcpStream) -> Result<SocketAddr> {
        use socket2::SockRef;
        use std::net::IpAddr;

        let local = stream
            .local_addr()
            .map_err(|e| ProxyError::Resolution(format!("cannot read local address: {}", e)))?;

        let socket = SockRef::from(stream);
        // IPv4 clients on a dual-stack listener show up as v4-mapped addresses
        // but are tracked by the IPv4 table.
        let query = match local.ip() {
            IpAddr::V6(ip) if ip.to_ipv4_mapped().is_none() => socket.original_dst_ipv6(),
            _ => socket.original_dst(),
        };

        let original = query
            .map_err(|e| ProxyError::Resolution(format!("SO_ORIGINAL_DST query failed: {}", e)))?
            .as_socket()
            .ok_or_else(|| {
                ProxyError::Resolution("SO_ORIGINAL_DST returned a non-IP address".to_string())
            })?;

        check_redirected(original, local)
    }
}

/// Resolver for platforms without a supported redirection mechanism
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedResolver;

impl DestinationResolver for UnsupportedResolver {
    fn resolve(&self, _stream: &TcpStream) -> Result<SocketAddr> {
        Err(ProxyError::Resolution(format!(
            "original destination recovery is not supported on {}",
            std::env::consts::OS
        )))
    }
}

/// Resolver for the platform this binary was built for
#[cfg(any(target_os = "linux", target_os = "android"))]
pub type SystemResolver = NetfilterResolver;

/// Resolver for the platform this binary was built for
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub type SystemResolver = UnsupportedResolver;

/// Reject connections that were never redirected
///
/// Without a NAT entry the kernel reports the listener's own address, and
/// relaying there would loop back into this process.
pub fn check_redirected(original: SocketAddr, local: SocketAddr) -> Result<SocketAddr> {
    let original = SocketAddr::new(original.ip().to_canonical(), original.port());
    let local = SocketAddr::new(local.ip().to_canonical(), local.port());

    if original == local {
        return Err(ProxyError::Resolution(format!(
            "connection to {} was not redirected",
            local
        )));
    }

    Ok(original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[test]
    fn test_check_redirected() {
        let local: SocketAddr = "127.0.0.1:1081".parse().unwrap();
        let original: SocketAddr = "203.0.113.9:443".parse().unwrap();

        assert_eq!(check_redirected(original, local).unwrap(), original);
        assert!(matches!(
            check_redirected(local, local),
            Err(ProxyError::Resolution(_))
        ));
    }

    #[test]
    fn test_check_redirected_mapped_addresses() {
        let local: SocketAddr = "[::ffff:127.0.0.1]:1081".parse().unwrap();
        let same: SocketAddr = "127.0.0.1:1081".parse().unwrap();
        assert!(check_redirected(same, local).is_err());

        let original: SocketAddr = "[::ffff:198.51.100.4]:80".parse().unwrap();
        let expected: SocketAddr = "198.51.100.4:80".parse().unwrap();
        assert_eq!(check_redirected(original, local).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_unsupported_resolver_fails() {
        let (_client, server) = loopback_pair().await;
        let err = UnsupportedResolver.resolve(&server).unwrap_err();
        assert!(matches!(err, ProxyError::Resolution(_)));
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[tokio::test]
    async fn test_netfilter_rejects_direct_connection() {
        // Either there is no conntrack entry, or it reports the listener itself
        let (_client, server) = loopback_pair().await;
        let err = NetfilterResolver.resolve(&server).unwrap_err();
        assert!(matches!(err, ProxyError::Resolution(_)));
    }
}
