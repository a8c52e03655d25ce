//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → config/config.<env>.toml (loader.rs, parse with toml)
//!     → environment variables (SERVER_ENV, DEBUG, APP_SERVER__PORT, ...)
//!     → Config (provider.rs, immutable)
//!     → shared via Arc to all subsystems
//!
//! Typed sections (schema.rs):
//!     [server] [logger] [telemetry] [error_reporting]
//!     → validation.rs (semantic checks)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All keys have defaults to allow running without any file locally
//! - Outside the default environment a missing file is fatal

pub mod loader;
pub mod provider;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, ConfigLoader};
pub use provider::Config;
pub use schema::{ErrorReportingConfig, LoggerConfig, ServerConfig, TelemetryConfig};
