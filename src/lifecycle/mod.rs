//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Observability hooks → Logger → Engine mode → Router
//!
//! Control (controller.rs):
//!     init → start → serve until exit → shutdown sequence → exit cause
//!
//! Shutdown (shutdown.rs):
//!     Exit request or signal → ShuttingDown (once) → Clean services
//!         → Stop accepting → Drain connections → Terminated
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ServerHandle::exit(Some(signal))
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then the router
//! - Ordered shutdown: clean services, stop accept, drain
//! - Shutdown has timeout: connections still open at the deadline are aborted

pub mod controller;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use controller::{Server, ServerError, ServerHandle};
pub use shutdown::{ExitCause, Lifecycle, LifecycleState};
pub use signals::{ExitSignal, SignalListener};
pub use startup::{assemble, AppContext, StartupError};
