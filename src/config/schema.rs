//! Configuration schema definitions.
//!
//! Typed views over sections of the layered configuration. All types derive
//! Serde traits and are extracted from the [`Config`](super::Config) handle.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Key holding the environment name.
pub const ENVIRONMENT_KEY: &str = "server_env";

/// Environment used when none is configured. Its config file is optional.
pub const DEFAULT_ENVIRONMENT: &str = "local";

/// Key of the debug switch.
pub const DEBUG_KEY: &str = "debug";

/// Key of the telemetry switch.
pub const TELEMETRY_ENABLED_KEY: &str = "enable_telemetry";

/// Listener and shutdown settings, read from `[server]`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Upper bound for draining in-flight connections on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 10_000,
            shutdown_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Address in `host:port` form.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logger settings, read from the optional `[logger]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,

    /// Append log output to this file instead of stdout.
    pub file: Option<PathBuf>,

    /// `json` switches to structured JSON lines.
    pub formatter: Option<String>,

    /// Collector URL receiving every error-level log event.
    pub reporting: Option<String>,
}

impl LoggerConfig {
    pub fn is_json(&self) -> bool {
        self.formatter
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

/// Telemetry exporter settings, read from `[telemetry]`.
///
/// Only honoured when `enable_telemetry` is also true.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Application label attached to every metric.
    pub app: String,

    /// Prometheus scrape endpoint bind address.
    pub listen: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            app: String::new(),
            listen: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Error reporting client settings, read from `[error_reporting]`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ErrorReportingConfig {
    /// Collector endpoint that receives error events.
    pub dsn: String,
}
