//! Logging helpers
//!
//! The library only talks to the `log` facade; the binary installs `env_logger`.

use log::warn;

use crate::config::defaults::LOG_LEVEL_STR;

/// Level names accepted by `log-level`
const LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace", "off"];

/// Canonical name of `level`, or `None` if it is not a log level
///
/// `env_logger` reads any other word as a module name, which would filter
/// out every record of this crate.
pub fn known_level(level: &str) -> Option<&'static str> {
    let level = level.trim();
    LEVELS.iter().copied().find(|known| known.eq_ignore_ascii_case(level))
}

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `level` when it is set. An unknown
/// `level` falls back to `info`. Calling this more than once keeps the first
/// logger.
///
/// # Parameters
///
/// * `level` - Default log level (error, warn, info, debug, trace)
pub fn init_logger(level: &str) {
    let filter = known_level(level);
    let env = env_logger::Env::default().filter_or("RUST_LOG", filter.unwrap_or(LOG_LEVEL_STR));

    let installed = env_logger::Builder::from_env(env).try_init().is_ok();
    if installed && filter.is_none() {
        warn!("Invalid log level: {}. Using default: {}", level, LOG_LEVEL_STR);
    }
}
