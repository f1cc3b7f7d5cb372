//! Common module
//!
//! This module contains shared errors and utility functions used throughout the application.

pub mod error;
pub mod log;
pub mod net;

// Re-export commonly used types and functions
pub use error::{ProxyError, Result};
pub use self::log::{init_logger, known_level};
pub use net::parse_socket_addr;
