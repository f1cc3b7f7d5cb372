//! Proxy service module
//!
//! The transparent relay itself: recovering the original destination,
//! dialing it through the upstream proxy, copying bytes both ways, and the
//! accept/shutdown lifecycle around it.

mod connector;
mod endpoint;
mod handler;
pub mod relay;
pub mod resolver;
pub mod server;
mod shutdown;
pub mod tuning;

pub use connector::{Dialer, ProxyDialer};
pub use endpoint::{Credentials, ProxyEndpoint, ProxyScheme};
pub use handler::{handle_connection, RelaySettings};
pub use relay::{relay, CopyStrategy, Direction, RelayOptions, RelayReport, Termination};
pub use resolver::{DestinationResolver, SystemResolver, UnsupportedResolver};
pub use server::{ActiveSessions, TransparentProxy};
pub use shutdown::ShutdownCoordinator;
pub use tuning::{tune, Transport};

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use resolver::NetfilterResolver;
