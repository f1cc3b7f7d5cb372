//! Kumasocks command line tool
//!
//! Loads the configuration, starts the transparent relay and runs until a
//! termination signal arrives.

use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::process;

use kumasocks::common::{init_logger, ProxyError, Result};
use kumasocks::config::{RelayConfig, DEFAULT_CONFIG_PATH};
use kumasocks::proxy::{ProxyDialer, ProxyEndpoint, RelaySettings, ShutdownCoordinator, SystemResolver};
use kumasocks::{TransparentProxy, APP_NAME, VERSION};

/// Transparent TCP relay through a SOCKS/HTTP proxy
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[clap(short = 'c', long = "config", env = "KUMASOCKS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("{}: {}", APP_NAME, e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = RelayConfig::from_file(&args.config)?;
    init_logger(&config.log_level);

    info!("Starting {} v{}", APP_NAME, VERSION);
    info!("Configuration loaded from {}", args.config.display());

    let dialer = ProxyDialer::new(config.proxy_addr.parse::<ProxyEndpoint>()?);
    info!("Upstream proxy: {}", dialer.endpoint());
    if config.io_copy_hack {
        info!("Using explicit read/write copy loop");
    }

    let proxy = TransparentProxy::bind(
        &config.listen_addr,
        SystemResolver::default(),
        dialer,
        RelaySettings::from(&config),
    )
    .await?;

    let shutdown = ShutdownCoordinator::new();
    let server = tokio::spawn(proxy.run(shutdown.clone()));

    info!("Relay ready, send SIGINT or SIGTERM to stop");
    shutdown.wait_for_signal().await?;

    info!("Exiting {}", APP_NAME);
    let sessions = server
        .await
        .map_err(|e| ProxyError::Other(format!("Accept loop failed: {}", e)))?;

    let aborted = sessions.drain(config.grace_period()).await;
    if aborted > 0 {
        warn!("{} session(s) were cut short by shutdown", aborted);
    }

    Ok(())
}
