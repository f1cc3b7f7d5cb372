//! Socket tuning for relay legs
//!
//! Real sockets get keep-alive and `TCP_NODELAY`; transports without a socket
//! underneath (in-memory pipes) simply opt out of the capability.

use log::debug;
use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// A duplex byte stream that can carry one leg of a relay
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Underlying socket, if this transport has one that accepts options
    fn socket(&self) -> Option<SockRef<'_>> {
        None
    }
}

impl Transport for TcpStream {
    fn socket(&self) -> Option<SockRef<'_>> {
        Some(SockRef::from(self))
    }
}

impl Transport for DuplexStream {}

/// Enable keep-alive and disable Nagle on a transport that supports it
///
/// # Returns
///
/// `Ok(true)` if the options were applied, `Ok(false)` if the transport has
/// no socket to tune.
pub fn tune<T: Transport>(stream: &T, keepalive: Duration) -> io::Result<bool> {
    let Some(socket) = stream.socket() else {
        debug!("Transport has no socket options, skipping tuning");
        return Ok(false);
    };

    let params = TcpKeepalive::new().with_time(keepalive);
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "macos", windows))]
    let params = params.with_interval(keepalive);

    socket.set_tcp_keepalive(&params)?;
    socket.set_nodelay(true)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tune_tcp_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let client = client.unwrap();
        let (server, _) = accepted.unwrap();

        assert!(tune(&client, Duration::from_secs(30)).unwrap());
        assert!(tune(&server, Duration::from_secs(10)).unwrap());

        assert!(client.nodelay().unwrap());
        assert!(SockRef::from(&server).keepalive().unwrap());
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        assert_eq!(
            SockRef::from(&server).keepalive_time().unwrap(),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn test_in_memory_transport_is_skipped() {
        let (a, _b) = tokio::io::duplex(64);
        assert!(!tune(&a, Duration::from_secs(30)).unwrap());
    }
}
