//! Configuration loading functionality
//!
//! Loads `RelayConfig` from a TOML file through the `config` crate and lays the
//! `KUMASOCKS_*` environment overrides on top.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat};
use log::debug;
use std::env;
use std::path::Path;

use super::defaults::ENV_PREFIX;
use super::RelayConfig;
use crate::common::{ProxyError, Result};

/// Environment variable suffixes and the configuration keys they override
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("LISTEN_ADDR", "listen-addr"),
    ("PROXY_ADDR", "proxy-addr"),
    ("LOG_LEVEL", "log-level"),
];

impl RelayConfig {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Config` if the file is missing or unreadable, is not
    /// valid TOML, or holds an invalid value, and `ProxyError::ProxyConfig` if
    /// `proxy-addr` is not a usable proxy URL.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(ProxyError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        debug!("Loading configuration from {}", path.display());

        let builder = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true));

        Self::build(with_env_overrides(builder)?, &path.display().to_string())
    }

    /// Parse and validate configuration from TOML text, ignoring the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let builder = Config::builder().add_source(File::from_str(content, FileFormat::Toml));

        Self::build(builder, "<inline>")
    }

    fn build(builder: ConfigBuilder<DefaultState>, origin: &str) -> Result<Self> {
        let config: RelayConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| ProxyError::Config(format!("Failed to load {}: {}", origin, e)))?;

        config.validate()?;
        Ok(config)
    }
}

fn with_env_overrides(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>> {
    for (suffix, key) in ENV_OVERRIDES {
        let value = env::var(format!("{}{}", ENV_PREFIX, suffix)).ok();
        if value.is_some() {
            debug!("Overriding {} from {}{}", key, ENV_PREFIX, suffix);
        }

        builder = builder
            .set_override_option(*key, value)
            .map_err(|e| ProxyError::Config(e.to_string()))?;
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_str_minimal() {
        let config = RelayConfig::from_toml_str(
            r#"
            listen-addr = "127.0.0.1:1081"
            proxy-addr = "socks5://127.0.0.1:1080"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:1081");
        assert_eq!(config.proxy_addr, "socks5://127.0.0.1:1080");
        assert!(!config.io_copy_hack);
        assert_eq!(config.buffer_size, 32 * 1024);
    }

    #[test]
    fn test_from_toml_str_all_keys() {
        let config = RelayConfig::from_toml_str(
            r#"
            listen-addr = "0.0.0.0:9000"
            proxy-addr = "http://proxy.internal:3128"
            io-copy-hack = true
            log-level = "debug"
            buffer-size = 65536
            keepalive-interval = 15
            shutdown-grace-period = 5
            "#,
        )
        .unwrap();

        assert!(config.io_copy_hack);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.buffer_size, 65536);
        assert_eq!(config.keepalive_interval, 15);
        assert_eq!(config.shutdown_grace_period, 5);
    }

    #[test]
    fn test_missing_required_key() {
        let err = RelayConfig::from_toml_str(r#"listen-addr = "127.0.0.1:1081""#).unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)), "got {:?}", err);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = RelayConfig::from_toml_str(
            r#"
            listen-addr = "127.0.0.1:1081"
            proxy-addr = "socks5://127.0.0.1:1080"
            target = "10.0.0.1:80"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)), "got {:?}", err);
    }

    #[test]
    fn test_malformed_toml() {
        let err = RelayConfig::from_toml_str("listen-addr = ").unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RelayConfig::from_file("/nonexistent/kumasocks.toml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
