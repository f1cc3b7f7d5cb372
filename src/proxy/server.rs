//! Proxy server module
//!
//! Owns the listening socket and runs the accept loop. Every accepted
//! connection gets its own task; the loop never waits on a relay.

use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;

use super::connector::Dialer;
use super::handler::{handle_connection, RelaySettings};
use super::resolver::DestinationResolver;
use super::shutdown::ShutdownCoordinator;
use crate::common::{parse_socket_addr, ProxyError, Result};

/// Pause after a failed accept so a persistent error (e.g. `EMFILE`) does not spin
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Read-only state shared by all relay tasks
struct RelayContext<R, D> {
    resolver: R,
    dialer: D,
    settings: RelaySettings,
}

impl<R: DestinationResolver, D: Dialer> RelayContext<R, D> {
    async fn serve(&self, client: TcpStream, peer: SocketAddr) {
        if let Err(e) = handle_connection(client, peer, &self.resolver, &self.dialer, &self.settings).await {
            warn!("Dropping connection from {}: {}", peer, e);
        }
    }
}

/// Transparent proxy listener
///
/// Accepts redirected connections and relays each one to its original
/// destination through the configured dialer.
pub struct TransparentProxy<R, D> {
    listener: TcpListener,
    local_addr: SocketAddr,
    context: Arc<RelayContext<R, D>>,
}

impl<R: DestinationResolver, D: Dialer> TransparentProxy<R, D> {
    /// Bind the listening socket
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Listen` if the address is invalid or cannot be bound.
    pub async fn bind(addr: &str, resolver: R, dialer: D, settings: RelaySettings) -> Result<Self> {
        let listen_error = |source| ProxyError::Listen {
            addr: addr.to_string(),
            source,
        };

        let socket_addr = parse_socket_addr(addr).map_err(|e| {
            listen_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
        })?;
        let listener = TcpListener::bind(socket_addr).await.map_err(listen_error)?;
        let local_addr = listener.local_addr().map_err(listen_error)?;

        Ok(Self {
            listener,
            local_addr,
            context: Arc::new(RelayContext {
                resolver,
                dialer,
                settings,
            }),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop until `shutdown` is triggered
    ///
    /// The listener is closed when this returns, so new connection attempts
    /// are refused. Sessions that are still relaying are handed back in
    /// [`ActiveSessions`]; dropping that value aborts them.
    pub async fn run(self, shutdown: ShutdownCoordinator) -> ActiveSessions {
        info!("Transparent proxy listening on {}", self.local_addr);

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.stopped() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        let context = Arc::clone(&self.context);
                        sessions.spawn(async move { context.serve(client, peer).await });
                    }
                    Err(_) if shutdown.is_stopping() => break,
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!("Relay task failed: {}", e);
                    }
                }
            }
        }

        info!(
            "Stopped listening on {}, {} session(s) still active",
            self.local_addr,
            sessions.len()
        );
        ActiveSessions { tasks: sessions }
    }
}

/// Relay sessions that were still running when the accept loop stopped
pub struct ActiveSessions {
    tasks: JoinSet<()>,
}

impl ActiveSessions {
    /// Number of sessions not yet collected
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether every session has been collected
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for running sessions to finish on their own
    ///
    /// Sessions still running after `grace` are aborted; with `None` every
    /// session runs to completion.
    ///
    /// # Returns
    ///
    /// The number of sessions that had to be aborted.
    pub async fn drain(mut self, grace: Option<Duration>) -> usize {
        if self.tasks.is_empty() {
            return 0;
        }

        let Some(grace) = grace else {
            info!("Waiting for {} session(s) to finish", self.tasks.len());
            self.join_all().await;
            return 0;
        };

        info!("Waiting up to {:?} for {} session(s) to finish", grace, self.tasks.len());

        match timeout(grace, self.join_all()).await {
            Ok(()) => 0,
            Err(_) => {
                let remaining = self.tasks.len();
                warn!("Shutdown grace period elapsed, aborting {} session(s)", remaining);
                self.tasks.shutdown().await;
                remaining
            }
        }
    }

    async fn join_all(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!("Relay task failed during shutdown: {}", e);
            }
        }
    }
}
