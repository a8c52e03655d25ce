//! Request telemetry.
//!
//! # Responsibilities
//! - Install the Prometheus exporter when telemetry is enabled
//! - Record per-request metrics from the telemetry middleware
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, route, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Route label uses the matched route template, not the raw path
//! - Without an installed recorder the macros are no-ops

use std::net::{AddrParseError, SocketAddr};
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::Instrument;

use crate::config::TelemetryConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid telemetry listen address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to install metrics exporter: {0}")]
    Install(#[from] BuildError),
}

/// Telemetry hook built from `[telemetry]`.
#[derive(Debug, Clone)]
pub struct Telemetry {
    app: String,
    listen: SocketAddr,
}

impl Telemetry {
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let listen = config
            .listen
            .parse()
            .map_err(|source| TelemetryError::Address {
                address: config.listen.clone(),
                source,
            })?;
        Ok(Self {
            app: config.app.clone(),
            listen,
        })
    }

    pub fn listen_address(&self) -> SocketAddr {
        self.listen
    }

    /// Install the global recorder and start the scrape endpoint.
    pub fn install(&self) -> Result<(), TelemetryError> {
        PrometheusBuilder::new()
            .with_http_listener(self.listen)
            .add_global_label("app", self.app.clone())
            .install()?;
        Ok(())
    }

    pub fn app(&self) -> &str {
        &self.app
    }
}

/// Middleware recording request count and latency inside a request span.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let span = tracing::info_span!("request", method = %method, route = %route);
    let response = next.run(request).instrument(span).await;

    record_request(&method, &route, response.status().as_u16(), start);
    response
}

/// Record a completed request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_owned()),
        ("route", route.to_owned()),
        ("status", status.to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}
