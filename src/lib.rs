//! Kumasocks: transparent TCP relay through a SOCKS/HTTP proxy
//!
//! Connections that a packet filter rule (iptables `REDIRECT`, nftables
//! `redirect`) sends to the local listener have their original destination
//! recovered from the kernel and are forwarded there through an upstream
//! proxy. Clients never need to be configured for the proxy themselves.
//!
//! # Main Features
//!
//! - Original destination recovery via `SO_ORIGINAL_DST` on Linux
//! - SOCKS4, SOCKS5 and HTTP `CONNECT` upstream proxies, with credentials
//! - Full-duplex relay with two interchangeable copy strategies
//! - Graceful shutdown that lets running sessions finish
//!
//! # Example
//!
//! ```no_run
//! use kumasocks::proxy::{ProxyDialer, ProxyEndpoint, RelaySettings, ShutdownCoordinator,
//!                        SystemResolver, TransparentProxy};
//! use kumasocks::Result;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let endpoint = ProxyEndpoint::from_url("socks5://127.0.0.1:1080")?;
//!     let proxy = TransparentProxy::bind(
//!         "0.0.0.0:1081",
//!         SystemResolver::default(),
//!         ProxyDialer::new(endpoint),
//!         RelaySettings::default(),
//!     )
//!     .await?;
//!
//!     let shutdown = ShutdownCoordinator::new();
//!     let server = tokio::spawn(proxy.run(shutdown.clone()));
//!
//!     shutdown.wait_for_signal().await?;
//!     if let Ok(sessions) = server.await {
//!         sessions.drain(Some(Duration::from_secs(30))).await;
//!     }
//!     Ok(())
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod proxy;

// Re-export commonly used structures and functions for convenience
pub use common::{parse_socket_addr, ProxyError, Result};
pub use config::RelayConfig;
pub use proxy::TransparentProxy;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
