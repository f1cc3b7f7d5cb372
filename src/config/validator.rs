//! Configuration validator
//!
//! Checks values serde cannot check on its own.

use super::RelayConfig;
use crate::common::{ProxyError, Result};
use crate::proxy::ProxyEndpoint;

/// Largest accepted relay buffer (16 MiB)
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

impl RelayConfig {
    /// Validate the configuration
    ///
    /// `log-level` is not checked here: the logger is not installed yet, so
    /// [`init_logger`](crate::common::init_logger) handles unknown levels.
    pub fn validate(&self) -> Result<()> {
        validate_network_settings(self)?;
        validate_general_settings(self)?;
        Ok(())
    }
}

fn validate_network_settings(config: &RelayConfig) -> Result<()> {
    if config.listen_addr.trim().is_empty() {
        return Err(ProxyError::Config("listen-addr must not be empty".to_string()));
    }

    // Surfaces scheme and URL problems as ProxyConfig errors
    ProxyEndpoint::from_url(&config.proxy_addr)?;

    Ok(())
}

fn validate_general_settings(config: &RelayConfig) -> Result<()> {
    if config.buffer_size == 0 || config.buffer_size > MAX_BUFFER_SIZE {
        return Err(ProxyError::Config(format!(
            "buffer-size must be between 1 and {} bytes, got {}",
            MAX_BUFFER_SIZE, config.buffer_size
        )));
    }

    if config.keepalive_interval == 0 {
        return Err(ProxyError::Config(
            "keepalive-interval must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RelayConfig {
        RelayConfig::new("127.0.0.1:1081", "socks5://127.0.0.1:1080")
    }

    #[test]
    fn test_valid_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_unknown_log_level_accepted() {
        let mut config = base();
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_listen_addr() {
        let mut config = base();
        config.listen_addr = "  ".to_string();
        assert!(matches!(config.validate(), Err(ProxyError::Config(_))));
    }

    #[test]
    fn test_bad_proxy_url() {
        let mut config = base();
        config.proxy_addr = "ftp://127.0.0.1:21".to_string();
        assert!(matches!(config.validate(), Err(ProxyError::ProxyConfig(_))));

        config.proxy_addr = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ProxyError::ProxyConfig(_))));
    }

    #[test]
    fn test_buffer_size_bounds() {
        let mut config = base();
        config.buffer_size = 0;
        assert!(config.validate().is_err());

        config.buffer_size = MAX_BUFFER_SIZE + 1;
        assert!(config.validate().is_err());

        config.buffer_size = 4096;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_keepalive() {
        let mut config = base();
        config.keepalive_interval = 0;
        assert!(config.validate().is_err());
    }
}
