//! Process termination
//!
//! The sidecar ends in exactly one way: `terminate` with an outcome.
//! SIGTERM and SIGINT request a clean exit that skips any drain wait.

use std::future::Future;
use tracing::{error, info};

/// How the process is ending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Drain finished or an external stop was requested
    Clean,
    /// A fatal error occurred
    Unclean,
}

impl ShutdownOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownOutcome::Clean => 0,
            ShutdownOutcome::Unclean => 1,
        }
    }
}

/// Exit the process with the code for `outcome`
pub fn terminate(outcome: ShutdownOutcome) -> ! {
    let code = outcome.exit_code();
    match outcome {
        ShutdownOutcome::Clean => info!("Detected clean exit, exit({})", code),
        ShutdownOutcome::Unclean => error!("Detected unclean exit, exit({})", code),
    }
    std::process::exit(code)
}

/// Drive `work` to its outcome unless `stop` resolves first
///
/// A stop is an external request, so it is always clean and any
/// remaining drain wait is abandoned.
pub async fn run_until_stopped<W, S>(work: W, stop: S) -> ShutdownOutcome
where
    W: Future<Output = ShutdownOutcome>,
    S: Future<Output = &'static str>,
{
    tokio::select! {
        outcome = work => outcome,
        signal = stop => {
            info!(signal, "Stop requested, exiting without waiting");
            ShutdownOutcome::Clean
        }
    }
}

/// Registered termination signal listeners
///
/// Register before any other work so a stop during bootstrap is honoured.
#[cfg(unix)]
pub struct ShutdownSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for SIGTERM or SIGINT, returning the signal name
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => {
                info!("Received SIGTERM");
                "SIGTERM"
            }
            _ = self.sigint.recv() => {
                info!("Received SIGINT");
                "SIGINT"
            }
        }
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Wait for Ctrl+C
    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to wait for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C");
        "CTRL_C"
    }
}
