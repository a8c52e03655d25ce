//! Router assembly.
//!
//! # Data Flow
//! ```text
//! request
//!     → request id          (assign / propagate x-request-id)
//!     → request logging     (debug mode only)
//!     → telemetry           (when the telemetry hook is active)
//!     → recovery            (panics and reported errors → JSON error body)
//!     → /health, /, service routes
//! ```

use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::Config;
use crate::http::handlers::{self, HostState};
use crate::http::recovery::{recover, Recovery};
use crate::http::request::with_request_id;
use crate::http::server::EngineMode;
use crate::observability::{metrics::track_metrics, Hooks};
use crate::service::Service;

/// Build the router: built-in endpoints, then each service's routes in
/// registration order, wrapped in the middleware chain.
pub fn attach(
    config: Arc<Config>,
    hooks: &Hooks,
    mode: EngineMode,
    services: &[Arc<dyn Service>],
) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::info))
        .with_state(HostState::new(config, services));

    for service in services {
        router = service.register_routes(router);
        tracing::debug!(service = service.name(), "Service routes registered");
    }

    let recovery = Recovery::new(mode.is_debug()).with_reporter(hooks.reporter.clone());
    router = router.layer(middleware::from_fn_with_state(recovery, recover));
    if hooks.reporter.is_some() {
        tracing::info!("Error reporting is enabled");
    }

    if let Some(telemetry) = &hooks.telemetry {
        router = router.layer(middleware::from_fn(track_metrics));
        tracing::info!(
            address = %telemetry.listen_address(),
            app = telemetry.app(),
            "Telemetry is enabled"
        );
    }

    if mode.is_debug() {
        router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );
    }

    with_request_id(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::{ConfigLoader, TelemetryConfig};
    use crate::http::request::X_REQUEST_ID;
    use crate::observability::Telemetry;

    struct Stub {
        name: &'static str,
        healthy: bool,
    }

    #[async_trait]
    impl Service for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn register_routes(&self, router: Router) -> Router {
            let path = format!("/{}", self.name);
            router
                .route(&path, get(|| async { "stub" }))
                .route(&format!("{path}/boom"), get(boom))
        }

        async fn health(&self) -> anyhow::Result<()> {
            if self.healthy {
                Ok(())
            } else {
                Err(anyhow!("database unreachable"))
            }
        }
    }

    async fn boom() -> &'static str {
        panic!("boom")
    }

    fn config() -> Arc<Config> {
        let loader = ConfigLoader::new()
            .without_env()
            .with_default("name", "orders")
            .with_default("version", "1.4.2");
        Arc::new(loader.defaults())
    }

    fn router(mode: EngineMode, services: Vec<Arc<dyn Service>>) -> Router {
        attach(config(), &Hooks::default(), mode, &services)
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key(X_REQUEST_ID));
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_without_services_is_ok() {
        let (status, body) = get_body(router(EngineMode::Release, vec![]), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"healthy"}"#);
    }

    #[tokio::test]
    async fn health_reports_failing_service() {
        let services: Vec<Arc<dyn Service>> = vec![
            Arc::new(Stub { name: "cache", healthy: true }),
            Arc::new(Stub { name: "db", healthy: false }),
        ];
        let (status, body) = get_body(router(EngineMode::Release, services), "/health").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"service db is unhealthy","code":0}"#);
    }

    #[tokio::test]
    async fn root_reports_name_and_version() {
        let (status, body) = get_body(router(EngineMode::Debug, vec![]), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"app":"orders","version":"1.4.2"}"#);
    }

    #[tokio::test]
    async fn service_routes_are_registered() {
        let services: Vec<Arc<dyn Service>> =
            vec![Arc::new(Stub { name: "stub", healthy: true })];
        let (status, body) = get_body(router(EngineMode::Release, services), "/stub").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "stub");
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let (status, body) = get_body(router(EngineMode::Release, vec![]), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"error":"Not Found","code":0}"#);
    }

    #[test]
    fn telemetry_records_recovered_panics() {
        let telemetry = Telemetry::from_config(&TelemetryConfig {
            app: "orders".into(),
            listen: "127.0.0.1:9464".into(),
        })
        .unwrap();
        let hooks = Hooks {
            telemetry: Some(telemetry),
            reporter: None,
        };
        let services: Vec<Arc<dyn Service>> =
            vec![Arc::new(Stub { name: "svc", healthy: true })];
        let router = attach(config(), &hooks, EngineMode::Debug, &services);

        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (status, body) = metrics::with_local_recorder(&recorder, || {
            runtime.block_on(get_body(router, "/svc/boom"))
        });

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"Internal Server Error","code":0}"#);
        let rendered = handle.render();
        let line = rendered
            .lines()
            .find(|line| line.starts_with("http_requests_total{"))
            .expect("request counted");
        assert!(line.contains(r#"route="/svc/boom""#), "{line}");
        assert!(line.contains(r#"status="500""#), "{line}");
        assert!(line.ends_with(" 1"), "{line}");
    }
}
