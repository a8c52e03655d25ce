//! Error reporting client.
//!
//! Panics and server-side failures seen by the recovery middleware are
//! forwarded to an [`ErrorReporter`]. The bundled [`HttpErrorReporter`] posts
//! JSON events to the collector configured in `[error_reporting]`.
//!
//! [`ReportingLayer`] does the same for every `ERROR` log event when
//! `[logger] reporting` names a collector.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use url::Url;

use crate::config::ErrorReportingConfig;

/// Severity of a reported event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A handler reported a server-side failure.
    Error,
    /// A handler panicked.
    Fatal,
}

/// A single error occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub message: String,
    pub level: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Sink for error events. Implementations must not block the caller.
pub trait ErrorReporter: Send + Sync + 'static {
    fn report(&self, event: ErrorEvent);
}

#[derive(Debug, thiserror::Error)]
pub enum ReportingError {
    #[error("invalid error reporting DSN: {0}")]
    Dsn(#[from] url::ParseError),

    #[error("unsupported error reporting scheme {0:?}")]
    Scheme(String),

    #[error("failed to build error reporting client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Wire format: the event tagged with the reporting service.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    event: &'a ErrorEvent,
    service: &'a str,
}

/// Posts events to an HTTP collector in the background.
#[derive(Debug, Clone)]
pub struct HttpErrorReporter {
    client: reqwest::Client,
    endpoint: Url,
    service: String,
}

impl HttpErrorReporter {
    /// `service` names the application in every event it sends.
    pub fn from_config(
        config: &ErrorReportingConfig,
        service: impl Into<String>,
    ) -> Result<Self, ReportingError> {
        let endpoint = Url::parse(&config.dsn)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ReportingError::Scheme(endpoint.scheme().to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            service: service.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ErrorReporter for HttpErrorReporter {
    fn report(&self, event: ErrorEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(message = %event.message, "No runtime available, dropping error event");
            return;
        };

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let service = self.service.clone();
        runtime.spawn(async move {
            let envelope = Envelope {
                event: &event,
                service: &service,
            };
            match client.post(endpoint).json(&envelope).send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(status = %response.status(), "Error collector rejected event");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to deliver error event"),
            }
        });
    }
}

/// Tracing layer forwarding `ERROR` events to an [`ErrorReporter`].
#[derive(Clone)]
pub struct ReportingLayer {
    reporter: Arc<dyn ErrorReporter>,
}

impl ReportingLayer {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { reporter }
    }
}

impl<S: Subscriber> Layer<S> for ReportingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }
        let mut fields = EventFields::default();
        event.record(&mut fields);
        self.reporter.report(fields.into_event());
    }
}

/// Fields of a log event, split into the ones [`ErrorEvent`] carries and the rest.
#[derive(Default)]
struct EventFields {
    message: Option<String>,
    method: Option<String>,
    uri: Option<String>,
    request_id: Option<String>,
    extra: Vec<String>,
}

impl EventFields {
    fn set(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "method" => self.method = Some(value),
            "uri" => self.uri = Some(value),
            "request_id" => self.request_id = Some(value),
            name => self.extra.push(format!("{name}={value}")),
        }
    }

    fn into_event(self) -> ErrorEvent {
        let mut message = self.message.unwrap_or_default();
        for field in self.extra {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&field);
        }
        ErrorEvent {
            message,
            level: Severity::Error,
            method: self.method,
            uri: self.uri,
            request_id: self.request_id,
        }
    }
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.set(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.set(field, format!("{value:?}"));
    }
}
