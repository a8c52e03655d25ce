//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Assembler:
//!     [logger]            → logging.rs (global tracing subscriber,
//!                           error events → reporting.rs when `reporting` is set)
//!     [telemetry]         → metrics.rs (Prometheus exporter, request metrics)
//!     [error_reporting]   → reporting.rs (error events to a collector)
//!
//! Request path:
//!     telemetry middleware → request span + metrics
//!     recovery middleware  → ErrorReporter on panics and 5xx
//! ```
//!
//! # Design Decisions
//! - Each hook is independently enabled by configuration presence
//! - Absence of a hook's section is never an error
//! - Misconfiguration of a present section is fatal at startup

pub mod logging;
pub mod metrics;
pub mod reporting;

use std::sync::Arc;

pub use self::metrics::Telemetry;
pub use reporting::{ErrorEvent, ErrorReporter, HttpErrorReporter, ReportingLayer, Severity};

/// Optional observability hooks built during startup.
#[derive(Clone, Default)]
pub struct Hooks {
    pub telemetry: Option<Telemetry>,
    pub reporter: Option<Arc<dyn ErrorReporter>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("telemetry", &self.telemetry)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}
