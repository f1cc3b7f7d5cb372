//! Shutdown coordination
//!
//! Turns termination signals into a single process-wide "stopping" state that
//! the accept loop watches. Running relay sessions are left alone.

use log::info;
use std::io;
use tokio_util::sync::CancellationToken;

/// Cloneable handle to the process run state
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator in the running state
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to the stopping state; later calls have no effect
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested, no longer accepting connections");
        }
        self.token.cancel();
    }

    /// Whether shutdown has been requested
    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been requested
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }

    /// Block until a termination signal arrives, then switch to stopping
    ///
    /// Also returns if [`trigger`](Self::trigger) is called from elsewhere.
    ///
    /// # Returns
    ///
    /// The name of the signal that ended the wait.
    pub async fn wait_for_signal(&self) -> io::Result<&'static str> {
        let name = self.next_signal().await?;
        info!("Received {}", name);
        self.trigger();
        Ok(name)
    }

    #[cfg(unix)]
    async fn next_signal(&self) -> io::Result<&'static str> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = signal(SignalKind::hangup())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut quit = signal(SignalKind::quit())?;

        Ok(tokio::select! {
            _ = hangup.recv() => "SIGHUP",
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
            _ = quit.recv() => "SIGQUIT",
            _ = self.stopped() => "shutdown request",
        })
    }

    #[cfg(not(unix))]
    async fn next_signal(&self) -> io::Result<&'static str> {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "Ctrl-C"),
            _ = self.stopped() => Ok("shutdown request"),
        }
    }
}
