//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Translate them to [`ExitSignal`] values
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers stay registered for the whole run; repeated signals are
//!   delivered again and it is up to the caller to ignore them
//! - Non-unix targets only see Ctrl-C, reported as an interrupt

use std::fmt;
use std::io;

/// A termination signal from the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for ExitSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitSignal::Interrupt => write!(f, "SIGINT"),
            ExitSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Registered interrupt and terminate handlers.
#[derive(Debug)]
pub struct SignalListener {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl SignalListener {
    /// Register the handlers. Must be called inside a Tokio runtime.
    #[cfg(unix)]
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> ExitSignal {
        tokio::select! {
            Some(()) = self.interrupt.recv() => ExitSignal::Interrupt,
            Some(()) = self.terminate.recv() => ExitSignal::Terminate,
            else => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> ExitSignal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ExitSignal::Interrupt,
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending().await
            }
        }
    }
}
