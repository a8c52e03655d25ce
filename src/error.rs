//! Request-time error model.
//!
//! # Data Flow
//! ```text
//! handler returns Err(Error)
//!     → IntoResponse stores the error in the response extensions
//!     → http::recovery renders the final JSON body
//!         App      → declared status, message, code (+ stack in debug)
//!         Internal → 500, generic message
//! ```
//!
//! # Design Decisions
//! - Tagged variants instead of runtime type inspection
//! - Causes are `anyhow::Error` so context chains survive wrapping
//! - Raw internal error text never reaches the client

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Message sent to clients for failures that carry no client-facing text.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Application error with a client-facing message, code and status.
pub struct AppError {
    message: String,
    code: i32,
    status: StatusCode,
    source: anyhow::Error,
    /// `false` when `source` only repeats `message`.
    wrapped: bool,
}

impl AppError {
    /// Create an error from a client-facing message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let source = anyhow::Error::msg(message.clone());
        Self::from_parts(message, source, false)
    }

    /// Wrap an underlying cause, exposing `message` to the client instead of the cause.
    pub fn wrap(source: impl Into<anyhow::Error>, message: impl Into<String>) -> Self {
        Self::from_parts(message.into(), source.into(), true)
    }

    fn from_parts(message: String, source: anyhow::Error, wrapped: bool) -> Self {
        Self {
            message,
            code: 0,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            source,
            wrapped,
        }
    }

    /// Set the HTTP status reported to the client.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set the application error code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The wrapped cause. For errors built with [`AppError::new`] this is the
    /// message itself.
    pub fn cause(&self) -> &anyhow::Error {
        &self.source
    }

    /// Message, cause chain and backtrace (when captured) as one string.
    pub fn stack(&self) -> String {
        if self.wrapped {
            format!("{}\n{:?}", self.message, self.source)
        } else {
            self.message.clone()
        }
    }

    /// Client-facing JSON body.
    pub fn body(&self, include_stack: bool) -> ErrorBody {
        ErrorBody {
            error: self.message.clone(),
            code: self.code,
            stack: include_stack.then(|| self.stack()),
        }
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("message", &self.message)
            .field("code", &self.code)
            .field("status", &self.status)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.message)?;
        if self.code != 0 {
            write!(f, " [code={}]", self.code)?;
        }
        if self.wrapped {
            write!(f, ": {}", self.source)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.wrapped.then(|| &*self.source as &(dyn std::error::Error + 'static))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Error::App(self).into_response()
    }
}

/// Error returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failure with an explicit client-facing message and status.
    #[error(transparent)]
    App(#[from] AppError),

    /// Any other failure. Reported to clients as a generic 500.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// HTTP status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::App(err) => err.status(),
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing JSON body. Stack detail is only ever attached to `App` errors.
    pub fn body(&self, include_stack: bool) -> ErrorBody {
        match self {
            Error::App(err) => err.body(include_stack),
            Error::Internal(_) => ErrorBody::internal(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response
            .extensions_mut()
            .insert(ReportedError(Arc::new(self)));
        response
    }
}

/// Error reported by a handler, carried to the recovery middleware.
#[derive(Debug, Clone)]
pub struct ReportedError(pub Arc<Error>);

/// JSON body sent for handled failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorBody {
    /// Body that reveals nothing about the failure.
    pub fn internal() -> Self {
        Self::for_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Body carrying only the canonical reason of `status`.
    pub fn for_status(status: StatusCode) -> Self {
        let error = match status {
            StatusCode::INTERNAL_SERVER_ERROR => INTERNAL_ERROR_MESSAGE,
            _ => status.canonical_reason().unwrap_or(INTERNAL_ERROR_MESSAGE),
        };
        Self {
            error: error.to_string(),
            code: 0,
            stack: None,
        }
    }
}

/// Conversion helpers for turning arbitrary failures into [`AppError`]s.
pub trait ResultExt<T> {
    /// Wrap the error with a client-facing message.
    fn app_err(self, message: impl Into<String>) -> Result<T, AppError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn app_err(self, message: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|err| AppError::wrap(err, message))
    }
}
