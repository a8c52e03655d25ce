//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration
//! - Build the optional observability hooks
//! - Install the logger
//! - Choose the engine mode and assemble the router
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Steps run in a fixed order, never concurrently
//! - An unusable `[logger]` section falls back to default logging; an
//!   unwritable log file or a bad `reporting` URL is fatal

use std::sync::Arc;

use axum::Router;

use crate::config::{
    Config, ConfigError, ConfigLoader, ErrorReportingConfig, LoggerConfig, TelemetryConfig,
};
use crate::http::router;
use crate::http::server::EngineMode;
use crate::observability::logging::{init_logging, LoggingError};
use crate::observability::metrics::TelemetryError;
use crate::observability::reporting::ReportingError;
use crate::observability::{ErrorReporter, Hooks, HttpErrorReporter, Telemetry};
use crate::service::Service;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Reporting(#[from] ReportingError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Everything startup produces, ready to be served.
#[derive(Debug)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub hooks: Hooks,
    pub mode: EngineMode,
    pub router: Router,
}

/// Run the startup sequence for `services`.
pub fn assemble(
    loader: &ConfigLoader,
    services: &[Arc<dyn Service>],
) -> Result<AppContext, StartupError> {
    let config = Arc::new(loader.load()?);
    let hooks = build_hooks(&config)?;
    install_logger(&config)?;

    let mode = EngineMode::from_debug(config.debug());
    let router = router::attach(Arc::clone(&config), &hooks, mode, services);

    tracing::info!(
        environment = %config.environment(),
        mode = %mode,
        services = services.len(),
        "Service initialized"
    );

    Ok(AppContext {
        config,
        hooks,
        mode,
        router,
    })
}

fn build_hooks(config: &Config) -> Result<Hooks, StartupError> {
    let telemetry = if config.telemetry_enabled() {
        match config.section::<TelemetryConfig>("telemetry")? {
            Some(section) => {
                let telemetry = Telemetry::from_config(&section)?;
                telemetry.install()?;
                Some(telemetry)
            }
            None => None,
        }
    } else {
        None
    };

    let reporter = match config.section::<ErrorReportingConfig>("error_reporting")? {
        Some(section) => {
            let reporter = HttpErrorReporter::from_config(&section, config.get_string("name"))?;
            Some(Arc::new(reporter) as Arc<dyn ErrorReporter>)
        }
        None => None,
    };

    Ok(Hooks { telemetry, reporter })
}

fn install_logger(config: &Config) -> Result<(), StartupError> {
    let (logger, invalid) = match config.section::<LoggerConfig>("logger") {
        Ok(section) => (section.unwrap_or_default(), None),
        Err(e) => (LoggerConfig::default(), Some(e)),
    };

    let reporter = match &logger.reporting {
        Some(dsn) => {
            let section = ErrorReportingConfig { dsn: dsn.clone() };
            let reporter = HttpErrorReporter::from_config(&section, config.get_string("name"))?;
            Some(Arc::new(reporter) as Arc<dyn ErrorReporter>)
        }
        None => None,
    };

    init_logging(&logger, reporter)?;
    if let Some(e) = invalid {
        tracing::warn!(error = %e, "Invalid logger configuration, using defaults");
    }
    Ok(())
}
