//! Per-connection serving and tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Drive one HTTP/1 or HTTP/2 connection through the router
//! - Switch a connection to graceful close when the stop signal fires
//! - Track connection tasks so shutdown can wait for them, bounded in time

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

use crate::net::listener::ConnectionPermit;

/// Relaxed ordering is enough: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Serve `stream` until the peer closes it or, after `stop` fires, until
/// in-flight requests finish.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    router: Router,
    mut stop: watch::Receiver<bool>,
) {
    let id = ConnectionId::new();
    tracing::trace!(connection_id = %id, peer_addr = %peer, "Connection opened");

    let builder = Builder::new(TokioExecutor::new());
    let connection =
        builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(connection);

    let result = if *stop.borrow_and_update() {
        connection.as_mut().graceful_shutdown();
        connection.as_mut().await
    } else {
        tokio::select! {
            result = connection.as_mut() => result,
            _ = stop.changed() => {
                tracing::trace!(connection_id = %id, "Closing connection gracefully");
                connection.as_mut().graceful_shutdown();
                connection.as_mut().await
            }
        }
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %id, peer_addr = %peer, error = %e, "Connection error");
    }
    tracing::trace!(connection_id = %id, "Connection closed");
}

/// Returned when connections outlive the shutdown timeout.
#[derive(Debug, thiserror::Error)]
#[error("{remaining} connection(s) still open after {timeout:?}")]
pub struct DrainTimeout {
    pub remaining: usize,
    pub timeout: Duration,
}

/// The set of running connection tasks.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    tasks: JoinSet<()>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next connection task to finish.
    pub async fn join_next(&mut self) -> Option<Result<(), JoinError>> {
        self.tasks.join_next().await
    }

    /// Wait for every connection to close. Connections still open after
    /// `timeout` are aborted and reported.
    pub async fn drain(mut self, timeout: Duration) -> Result<(), DrainTimeout> {
        let wait_all = async {
            while let Some(result) = self.tasks.join_next().await {
                log_task_failure(result);
            }
        };

        if tokio::time::timeout(timeout, wait_all).await.is_ok() {
            return Ok(());
        }

        let remaining = self.tasks.len();
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        Err(DrainTimeout { remaining, timeout })
    }
}

pub(crate) fn log_task_failure(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "Connection task panicked");
        }
    }
}
