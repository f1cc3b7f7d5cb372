//! Default configuration values
//!
//! Single source of truth for defaults so the serde attributes, the binary
//! and the tests agree.

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "KUMASOCKS_";

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/kumasocks.toml";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Default relay buffer size (32 KiB)
pub fn buffer_size() -> usize {
    32 * 1024
}

/// Default TCP keep-alive probe interval in seconds
pub fn keepalive_interval() -> u64 {
    30
}

/// Default time in seconds to let sessions finish after a termination signal
pub fn shutdown_grace_period() -> u64 {
    30
}
