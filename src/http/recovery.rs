//! Error-recovery middleware.
//!
//! # Responsibilities
//! - Catch panics raised anywhere downstream and answer with a 500
//! - Render errors reported by handlers as the uniform JSON error body
//! - Give non-JSON error responses produced by the framework (unmatched
//!   routes, extractor rejections) the same body
//! - Forward server-side failures to the error reporter
//!
//! # Design Decisions
//! - Registered innermost so it observes every handler failure
//! - Exactly one response per request: the handler's response is replaced,
//!   never amended
//! - A panic takes precedence: an error recorded before the handler panicked
//!   is unwound with it and never rendered
//! - Stack detail is attached only in debug mode

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::FutureExt;

use crate::error::{Error, ErrorBody, ReportedError};
use crate::http::request::request_id;
use crate::observability::{ErrorEvent, ErrorReporter, Severity};

/// Shared state of the recovery middleware.
#[derive(Clone)]
pub struct Recovery {
    debug: bool,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl Recovery {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Option<Arc<dyn ErrorReporter>>) -> Self {
        self.reporter = reporter;
        self
    }

    fn handle_error(&self, error: &Error, request: &RequestInfo) -> Response {
        let status = error.status();
        if status.is_server_error() {
            tracing::error!(
                method = %request.method,
                uri = %request.uri,
                request_id = request.id(),
                status = status.as_u16(),
                error = ?error,
                "Router error"
            );
            self.report(Severity::Error, error.to_string(), request);
        } else {
            tracing::warn!(
                method = %request.method,
                uri = %request.uri,
                request_id = request.id(),
                status = status.as_u16(),
                error = %error,
                "Router error"
            );
        }

        (status, Json(error.body(self.debug))).into_response()
    }

    fn handle_panic(&self, panic: &(dyn Any + Send), request: &RequestInfo) -> Response {
        let message = panic_message(panic);
        tracing::error!(
            method = %request.method,
            uri = %request.uri,
            request_id = request.id(),
            panic = %message,
            "Unexpected router error"
        );
        self.report(Severity::Fatal, message, request);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::internal()),
        )
            .into_response()
    }

    fn report(&self, level: Severity, message: String, request: &RequestInfo) {
        if let Some(reporter) = &self.reporter {
            reporter.report(ErrorEvent {
                message,
                level,
                method: Some(request.method.to_string()),
                uri: Some(request.uri.to_string()),
                request_id: request.request_id.clone(),
            });
        }
    }
}

/// What the middleware keeps about a request once it has been handed downstream.
struct RequestInfo {
    method: Method,
    uri: Uri,
    request_id: Option<String>,
}

impl RequestInfo {
    fn id(&self) -> &str {
        self.request_id.as_deref().unwrap_or("-")
    }
}

/// Middleware entry point; install with `axum::middleware::from_fn_with_state`.
pub async fn recover(State(recovery): State<Recovery>, request: Request, next: Next) -> Response {
    let info = RequestInfo {
        method: request.method().clone(),
        uri: request.uri().clone(),
        request_id: request_id(request.headers()),
    };

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(mut response) => match response.extensions_mut().remove::<ReportedError>() {
            Some(ReportedError(error)) => recovery.handle_error(&error, &info),
            None => normalize(response),
        },
        Err(panic) => recovery.handle_panic(&*panic, &info),
    }
}

/// Replace the body of an unrendered error response with [`ErrorBody`].
fn normalize(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(response.headers()) {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    let body = Json(ErrorBody::for_status(status)).into_response().into_body();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, body)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::body::{to_bytes, Body};
    use axum::extract::Query;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use crate::error::AppError;

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<ErrorEvent>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, event: ErrorEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    async fn ok() -> &'static str {
        "ok"
    }

    async fn explode() -> &'static str {
        panic!("kaboom")
    }

    async fn explode_formatted() -> &'static str {
        let id = 7;
        panic!("lost order {id}")
    }

    async fn not_found() -> Result<&'static str, Error> {
        Err(AppError::new("not found")
            .with_status(StatusCode::NOT_FOUND)
            .into())
    }

    async fn plain_failure() -> Result<&'static str, Error> {
        Err(anyhow::anyhow!("connection refused by db-primary:5432").into())
    }

    #[derive(serde::Deserialize)]
    struct Page {
        #[allow(dead_code)]
        n: u64,
    }

    async fn paged(Query(_page): Query<Page>) -> &'static str {
        "paged"
    }

    async fn conflict() -> (StatusCode, Json<serde_json::Value>) {
        (StatusCode::CONFLICT, Json(serde_json::json!({ "reason": "taken" })))
    }

    fn app(recovery: Recovery) -> Router {
        Router::new()
            .route("/paged", get(paged))
            .route("/conflict", get(conflict))
            .route("/ok", get(ok))
            .route("/panic", get(explode))
            .route("/panic-formatted", get(explode_formatted))
            .route("/not-found", get(not_found))
            .route("/plain", get(plain_failure))
            .layer(from_fn_with_state(recovery, recover))
    }

    async fn call(router: &Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(axum::http::Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn panic_becomes_500_and_service_keeps_serving() {
        let router = app(Recovery::new(false));

        let (status, body) = call(&router, "/panic").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"Internal Server Error","code":0}"#);

        let (status, body) = call(&router, "/ok").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn app_error_uses_declared_status_and_body() {
        let router = app(Recovery::new(false));
        let (status, body) = call(&router, "/not-found").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"error":"not found","code":0}"#);
    }

    #[tokio::test]
    async fn debug_mode_adds_stack() {
        let router = app(Recovery::new(true));
        let (status, body) = call(&router, "/not-found").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "not found");
        assert!(json["stack"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn plain_error_hides_internal_text() {
        for debug in [false, true] {
            let router = app(Recovery::new(debug));
            let (status, body) = call(&router, "/plain").await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(!body.contains("db-primary"), "leaked: {body}");
            assert!(!body.contains("stack"));
        }
    }

    #[tokio::test]
    async fn successful_responses_pass_through() {
        let router = app(Recovery::new(true));
        let (status, body) = call(&router, "/ok").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn server_failures_are_reported() {
        let reporter = Arc::new(RecordingReporter::default());
        let recovery =
            Recovery::new(false).with_reporter(Some(reporter.clone() as Arc<dyn ErrorReporter>));
        let router = app(recovery);

        call(&router, "/panic-formatted").await;
        call(&router, "/plain").await;
        call(&router, "/not-found").await;

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 2, "4xx errors are not reported");
        assert_eq!(events[0].level, Severity::Fatal);
        assert_eq!(events[0].message, "lost order 7");
        assert_eq!(events[0].uri.as_deref(), Some("/panic-formatted"));
        assert_eq!(events[1].level, Severity::Error);
    }

    #[tokio::test]
    async fn rejected_extractors_use_error_body() {
        let router = app(Recovery::new(false));
        let response = router
            .clone()
            .oneshot(axum::http::Request::get("/paged?n=abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"Bad Request","code":0}"#);
    }

    #[tokio::test]
    async fn unmatched_routes_use_error_body() {
        let router = app(Recovery::new(false));
        let (status, body) = call(&router, "/nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"error":"Not Found","code":0}"#);
    }

    #[tokio::test]
    async fn json_error_responses_pass_through() {
        let router = app(Recovery::new(false));
        let (status, body) = call(&router, "/conflict").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, r#"{"reason":"taken"}"#);
    }

    #[test]
    fn extracts_panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(&*payload), "owned message");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*payload), "panic with non-string payload");
    }
}
