//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use service_host::config::ServerConfig;
use service_host::{AppError, ConfigLoader, Error, ExitCause, Server, ServerError, ServerHandle};

/// Directory that never exists, so only defaults apply in `local`.
pub const NO_CONFIG_DIR: &str = "tests/__no_config__";

/// Loader bound to `127.0.0.1:<port>`, isolated from the process environment.
pub fn loader(port: u16, shutdown_timeout_secs: u64) -> ConfigLoader {
    ConfigLoader::new()
        .without_env()
        .with_config_dir(NO_CONFIG_DIR)
        .with_default("debug", false)
        .with_default(
            "server",
            ServerConfig {
                host: "127.0.0.1".into(),
                port,
                shutdown_timeout_secs,
                ..ServerConfig::default()
            },
        )
}

/// A server running on a background task.
pub struct RunningServer {
    pub handle: ServerHandle,
    pub task: JoinHandle<Result<ExitCause, ServerError>>,
    pub base_url: String,
}

impl RunningServer {
    /// Initialize `server`, start it and wait until it accepts connections.
    pub async fn start(mut server: Server, port: u16) -> Self {
        server.init().expect("startup");
        let handle = server.handle();
        let task = tokio::spawn(server.start());

        let running = tokio::time::timeout(Duration::from_secs(5), handle.wait_until_running())
            .await
            .expect("server did not start in time");
        assert!(running, "server stopped before serving");

        Self {
            handle,
            task,
            base_url: format!("http://127.0.0.1:{port}"),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Await the serving task's result.
    pub async fn finish(self) -> Result<ExitCause, ServerError> {
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

/// Start an error collector on an ephemeral port. Returns its event URL and
/// the JSON bodies it receives, in arrival order.
pub async fn start_collector() -> (String, mpsc::UnboundedReceiver<serde_json::Value>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let app = Router::new().route(
        "/events",
        post(move |Json(event): Json<serde_json::Value>| {
            let events_tx = events_tx.clone();
            async move {
                let _ = events_tx.send(event);
                "accepted"
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{address}/events"), events_rx)
}

/// Next event received by a collector, waiting at most five seconds.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<serde_json::Value>) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no error event delivered")
        .expect("collector stopped")
}

/// How a [`Recorder`] behaves during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    Succeed,
    Fail,
    Panic,
}

/// Service that records its cleanup into a shared journal and exposes
/// routes that misbehave on purpose.
pub struct Recorder {
    name: &'static str,
    cleanup: Cleanup,
    journal: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            cleanup: Cleanup::Succeed,
            journal: Arc::clone(journal),
        }
    }

    pub fn with_cleanup(mut self, cleanup: Cleanup) -> Self {
        self.cleanup = cleanup;
        self
    }
}

#[async_trait]
impl service_host::Service for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn register_routes(&self, router: Router) -> Router {
        let prefix = format!("/{}", self.name);
        router
            .route(&format!("{prefix}/ok"), get(|| async { "ok" }))
            .route(&format!("{prefix}/panic"), get(explode))
            .route(&format!("{prefix}/missing"), get(missing))
            .route(&format!("{prefix}/plain"), get(plain))
            .route(&format!("{prefix}/slow"), get(slow))
    }

    async fn clean(&self) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push(self.name.to_string());
        match self.cleanup {
            Cleanup::Succeed => Ok(()),
            Cleanup::Fail => Err(anyhow::anyhow!("{} failed to flush", self.name)),
            Cleanup::Panic => panic!("{} cleanup exploded", self.name),
        }
    }
}

async fn explode() -> &'static str {
    panic!("handler exploded")
}

async fn missing() -> Result<&'static str, Error> {
    Err(AppError::new("not found")
        .with_status(axum::http::StatusCode::NOT_FOUND)
        .into())
}

async fn plain() -> Result<&'static str, Error> {
    Err(anyhow::anyhow!("password=hunter2 rejected by upstream").into())
}

async fn slow(axum::extract::Query(query): axum::extract::Query<SlowQuery>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(query.ms)).await;
    "done"
}

#[derive(serde::Deserialize)]
struct SlowQuery {
    ms: u64,
}
