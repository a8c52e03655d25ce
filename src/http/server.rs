//! HTTP engine.
//!
//! # Responsibilities
//! - Run the accept loop over a bounded [`Listener`]
//! - Hand each connection to the router on its own task
//! - Stop accepting when told to and return the open connections
//!
//! # Design Decisions
//! - HTTP/1.1 and HTTP/2 are both served (protocol auto-detected)
//! - The engine never waits for connections itself; the caller drains the
//!   returned [`ConnectionSet`] under its own timeout
//! - A failed accept pauses the loop; repeated failures of the same kind are
//!   logged once

use std::fmt;
use std::io;
use std::time::Duration;

use axum::Router;
use tokio::sync::watch;

use crate::net::connection::{log_task_failure, serve_connection, ConnectionSet};
use crate::net::{Listener, ListenerError};

/// Pause after a failed accept (e.g. EMFILE) before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Tracks the last accept error so a persistent failure is logged once.
#[derive(Debug, Default)]
struct AcceptErrors {
    last: Option<io::ErrorKind>,
}

impl AcceptErrors {
    /// Record a failure. Returns `true` when its kind differs from the last one.
    fn record(&mut self, kind: io::ErrorKind) -> bool {
        let changed = self.last != Some(kind);
        self.last = Some(kind);
        changed
    }

    fn clear(&mut self) {
        self.last = None;
    }
}

/// Operating mode of the engine, chosen from the `debug` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Request logging and error stacks enabled.
    Debug,
    Release,
}

impl EngineMode {
    pub fn from_debug(debug: bool) -> Self {
        if debug {
            EngineMode::Debug
        } else {
            EngineMode::Release
        }
    }

    pub fn is_debug(self) -> bool {
        self == EngineMode::Debug
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineMode::Debug => write!(f, "debug"),
            EngineMode::Release => write!(f, "release"),
        }
    }
}

/// Serves a fully assembled router.
#[derive(Debug, Clone)]
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// Accept connections until `stop` flips to `true`.
    ///
    /// Every connection task receives the same stop signal and closes
    /// gracefully once its in-flight requests are answered. The still-open
    /// connections are handed back for draining.
    pub async fn run(self, listener: Listener, mut stop: watch::Receiver<bool>) -> ConnectionSet {
        let mut connections = ConnectionSet::new();
        let mut accept_errors = AcceptErrors::default();

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        accept_errors.clear();
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            permit,
                            self.router.clone(),
                            stop.clone(),
                        ));
                    }
                    Err(ListenerError::Accept(e)) => {
                        if accept_errors.record(e.kind()) {
                            tracing::warn!(error = %e, "Accept failed");
                        }
                        tokio::select! {
                            _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                            _ = stop.changed() => {}
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Listener unusable, no longer accepting");
                        break;
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_task_failure(finished);
                }
            }
        }

        tracing::debug!(open_connections = connections.len(), "Stopped accepting connections");
        connections
    }
}
