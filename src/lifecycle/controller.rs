//! Server controller.
//!
//! # Data Flow
//! ```text
//! Server::init   → startup::assemble → Initialized
//! Server::start  → bind → serve → Running
//!                  ↓ first of: SIGINT / SIGTERM / ServerHandle::exit
//!                  ShuttingDown(cause)
//!                  → clean services (registration order)
//!                  → stop accepting, close idle connections
//!                  → drain in-flight requests (bounded by shutdown timeout)
//!                  → Terminated(cause)
//! ```
//!
//! # Design Decisions
//! - Shutdown runs once, on the task that called `start`; exit requests
//!   only decide whether and why it runs
//! - A failing or panicking cleanup is logged and the next service still runs
//! - The library never terminates the process; the caller maps the returned
//!   cause or error to an exit status

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::config::ConfigLoader;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::{ExitCause, Lifecycle, LifecycleState};
use crate::lifecycle::signals::{ExitSignal, SignalListener};
use crate::lifecycle::startup::{assemble, AppContext, StartupError};
use crate::net::{ConnectionSet, DrainTimeout, Listener, ListenerError};
use crate::service::Service;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: ListenerError,
    },

    #[error("failed to register signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    #[error("server task failed: {0}")]
    Serve(#[from] JoinError),

    #[error("server shutdown error: {0}")]
    ShutdownTimeout(#[from] DrainTimeout),
}

/// Cloneable handle for observing and stopping a server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    lifecycle: Arc<Lifecycle>,
}

impl ServerHandle {
    /// Request shutdown. `None` means a programmatic exit (status 0), a
    /// signal means status 2.
    ///
    /// Returns `true` only for the call that started the shutdown. Calls
    /// made before `init` or after shutdown began are no-ops. A shutdown
    /// requested after `init` but before `start` takes effect when `start`
    /// runs: services are cleaned and nothing is served.
    pub fn exit(&self, signal: Option<ExitSignal>) -> bool {
        let cause = signal.map_or(ExitCause::Requested, ExitCause::Signal);
        let started = self.lifecycle.begin_shutdown(cause);
        if !started {
            tracing::debug!(
                cause = %cause,
                state = ?self.lifecycle.state(),
                "Exit ignored"
            );
        }
        started
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Resolves once the server accepts connections. `false` if it stopped
    /// before reaching that point.
    pub async fn wait_until_running(&self) -> bool {
        self.lifecycle.wait_until_running().await
    }

    /// Resolves once shutdown has begun.
    pub async fn wait_for_shutdown(&self) -> ExitCause {
        self.lifecycle.wait_for_shutdown().await
    }
}

/// The service host.
pub struct Server {
    loader: ConfigLoader,
    services: Vec<Arc<dyn Service>>,
    context: Option<AppContext>,
    lifecycle: Arc<Lifecycle>,
}

impl Server {
    pub fn new(loader: ConfigLoader) -> Self {
        Self {
            loader,
            services: Vec::new(),
            context: None,
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    /// Register a service. Order is kept for routes, health checks and cleanup.
    pub fn with_service(mut self, service: impl Service) -> Self {
        self.services.push(Arc::new(service));
        self
    }

    pub fn with_shared_service(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }

    /// Run the startup sequence. Idempotent once it has succeeded.
    pub fn init(&mut self) -> Result<(), StartupError> {
        if self.context.is_some() {
            return Ok(());
        }
        self.context = Some(assemble(&self.loader, &self.services)?);
        self.lifecycle.mark_initialized();
        Ok(())
    }

    /// Serve until shutdown completes, initializing first if needed.
    pub async fn start(mut self) -> Result<ExitCause, ServerError> {
        let context = match self.context.take() {
            Some(context) => context,
            None => {
                let context = assemble(&self.loader, &self.services)?;
                self.lifecycle.mark_initialized();
                context
            }
        };

        if let Some(cause) = self.lifecycle.state().exit_cause() {
            tracing::info!(cause = %cause, "Service is exiting before it started");
            self.clean_services().await;
            self.lifecycle.mark_terminated();
            return Ok(cause);
        }

        let server = context.config.server().map_err(StartupError::from)?;
        let address = server.bind_address();
        let listener = Listener::bind(&address, server.max_connections)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind {
                address,
                source: ListenerError::Bind(e),
            })?;

        let signals = SignalListener::register().map_err(ServerError::Signal)?;
        let signal_task = tokio::spawn(forward_signals(signals, self.handle()));

        let (stop_tx, stop_rx) = watch::channel(false);
        let serving = tokio::spawn(HttpServer::new(context.router).run(listener, stop_rx));
        self.lifecycle.mark_running();
        tracing::info!(
            address = %local_addr,
            "Service is running on http://localhost:{}",
            local_addr.port()
        );

        let cause = self.lifecycle.wait_for_shutdown().await;
        let timeout = Duration::from_secs(server.shutdown_timeout_secs);
        let result = self.shutdown(cause, stop_tx, serving, timeout).await;

        signal_task.abort();
        result
    }

    async fn shutdown(
        &self,
        cause: ExitCause,
        stop: watch::Sender<bool>,
        serving: JoinHandle<ConnectionSet>,
        timeout: Duration,
    ) -> Result<ExitCause, ServerError> {
        tracing::info!(cause = %cause, "Service is exiting");
        self.clean_services().await;

        stop.send_replace(true);
        let result = match serving.await {
            Ok(connections) => connections.drain(timeout).await.map_err(ServerError::from),
            Err(e) => Err(ServerError::from(e)),
        };
        self.lifecycle.mark_terminated();

        match result {
            Ok(()) => {
                tracing::info!(cause = %cause, "Service stopped");
                Ok(cause)
            }
            Err(e) => {
                tracing::error!(error = %e, "Server shutdown error");
                Err(e)
            }
        }
    }

    async fn clean_services(&self) {
        for service in &self.services {
            match AssertUnwindSafe(service.clean()).catch_unwind().await {
                Ok(Ok(())) => tracing::debug!(service = service.name(), "Service cleaned"),
                Ok(Err(e)) => {
                    tracing::error!(service = service.name(), error = ?e, "Service cleanup failed")
                }
                Err(_) => tracing::error!(service = service.name(), "Service cleanup panicked"),
            }
        }
    }
}

async fn forward_signals(mut signals: SignalListener, handle: ServerHandle) {
    loop {
        let signal = signals.recv().await;
        if handle.exit(Some(signal)) {
            tracing::info!(signal = %signal, "Received shutdown signal");
        } else {
            tracing::warn!(signal = %signal, "Already shutting down, signal ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::Router;

    struct CountingRoutes(Arc<AtomicUsize>);

    #[async_trait]
    impl Service for CountingRoutes {
        fn name(&self) -> &str {
            "counting"
        }

        fn register_routes(&self, router: Router) -> Router {
            self.0.fetch_add(1, Ordering::SeqCst);
            router
        }
    }

    #[test]
    fn repeated_init_does_not_reassemble() {
        figment::Jail::expect_with(|jail| {
            let registrations = Arc::new(AtomicUsize::new(0));
            let mut server =
                Server::new(ConfigLoader::new().with_config_dir(jail.directory()).without_env())
                    .with_service(CountingRoutes(Arc::clone(&registrations)));

            server.init().map_err(|e| e.to_string())?;
            server.init().map_err(|e| e.to_string())?;
            assert_eq!(registrations.load(Ordering::SeqCst), 1);
            Ok(())
        });
    }

    #[test]
    fn exit_before_init_is_ignored() {
        let server = Server::new(ConfigLoader::new().without_env());
        let handle = server.handle();
        assert!(!handle.exit(None));
        assert_eq!(handle.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn exit_after_init_wins_once() {
        figment::Jail::expect_with(|jail| {
            let mut server =
                Server::new(ConfigLoader::new().with_config_dir(jail.directory()).without_env());
            server.init().map_err(|e| e.to_string())?;
            let handle = server.handle();
            assert_eq!(handle.state(), LifecycleState::Initialized);

            assert!(handle.exit(Some(ExitSignal::Terminate)));
            assert!(!handle.exit(None));
            assert_eq!(
                handle.state(),
                LifecycleState::ShuttingDown(ExitCause::Signal(ExitSignal::Terminate))
            );
            Ok(())
        });
    }
}
