//! Connection handler module
//!
//! Drives one intercepted connection from accept to close: recover where the
//! client wanted to go, dial it through the upstream proxy, then relay.

use log::{debug, info, warn};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use super::connector::Dialer;
use super::relay::{relay, CopyStrategy, RelayOptions, RelayReport};
use super::resolver::DestinationResolver;
use super::tuning::{tune, Transport};
use crate::common::Result;
use crate::config::{defaults, RelayConfig};

/// Per-connection settings derived from the configuration
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub copy_strategy: CopyStrategy,
    pub buffer_size: usize,
    pub keepalive: Duration,
}

impl RelaySettings {
    fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            strategy: self.copy_strategy,
            buffer_size: self.buffer_size,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            copy_strategy: CopyStrategy::default(),
            buffer_size: defaults::buffer_size(),
            keepalive: Duration::from_secs(defaults::keepalive_interval()),
        }
    }
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            copy_strategy: config.copy_strategy(),
            buffer_size: config.buffer_size,
            keepalive: config.keepalive(),
        }
    }
}

/// Handle a single intercepted connection
///
/// On resolution or dial failure the error is returned and `client` is
/// dropped, which closes the connection without relaying anything.
///
/// # Parameters
///
/// * `client` - Accepted client stream
/// * `peer` - Client address, for logging
/// * `resolver` - Original destination resolver
/// * `dialer` - Upstream dialer
/// * `settings` - Relay settings
pub async fn handle_connection<R, D>(
    client: TcpStream,
    peer: SocketAddr,
    resolver: &R,
    dialer: &D,
    settings: &RelaySettings,
) -> Result<RelayReport>
where
    R: DestinationResolver,
    D: Dialer,
{
    let destination = resolver.resolve(&client)?;
    debug!("{} was redirected from {}", peer, destination);

    apply_tuning(&client, settings.keepalive, "client", peer);

    let upstream = dialer.dial(destination).await?;
    apply_tuning(&upstream, settings.keepalive, "upstream", peer);

    info!("Relaying {} -> {}", peer, destination);
    let started = Instant::now();

    let report = relay(client, upstream, settings.relay_options()).await;

    debug!(
        "Closed {} -> {} after {} ms ({}, {} bytes sent, {} bytes received)",
        peer,
        destination,
        started.elapsed().as_millis(),
        report.termination,
        report.client_to_upstream,
        report.upstream_to_client
    );

    Ok(report)
}

fn apply_tuning<T: Transport>(stream: &T, keepalive: Duration, leg: &str, peer: SocketAddr) {
    if let Err(e) = tune(stream, keepalive) {
        warn!("Cannot tune {} socket for {}: {}", leg, peer, e);
    }
}
