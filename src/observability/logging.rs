//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Configure level, output target and format from `[logger]`
//! - Forward error-level events to a collector when one is given
//!
//! # Design Decisions
//! - Default: colorized, timestamped, `debug` level on stdout
//! - `RUST_LOG` wins over the configured level
//! - An unknown level degrades to the default; an unwritable file is fatal

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggerConfig;
use crate::observability::reporting::{ErrorReporter, ReportingLayer};

/// Level used when none (or an unknown one) is configured.
pub const DEFAULT_LEVEL: Level = Level::DEBUG;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to open log file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Map a configured level name to a `tracing` level.
///
/// Returns `None` for names that are not recognised.
pub fn parse_level(raw: &str) -> Option<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(Level::WARN),
        "fatal" | "panic" => Some(Level::ERROR),
        other => other.parse().ok(),
    }
}

/// Install the global subscriber.
///
/// `reporter` receives every `ERROR` event that passes the filter.
/// Returns `Ok(false)` when a subscriber was already installed in this process.
pub fn init_logging(
    config: &LoggerConfig,
    reporter: Option<Arc<dyn ErrorReporter>>,
) -> Result<bool, LoggingError> {
    let configured = config.level.as_deref().map(|raw| (raw, parse_level(raw)));
    let level = match configured {
        Some((_, Some(level))) => level,
        _ => DEFAULT_LEVEL,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let (writer, ansi) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.clone(),
                    source,
                })?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
        None => (BoxMakeWriter::new(io::stdout), true),
    };

    let layer = if config.is_json() {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer().with_ansi(ansi).with_writer(writer).boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .with(reporter.map(ReportingLayer::new))
        .try_init()
        .is_ok();

    if !installed {
        tracing::debug!("Logger already initialized, keeping existing subscriber");
    }
    if let Some((raw, None)) = configured {
        tracing::warn!(level = raw, default = %DEFAULT_LEVEL, "Unknown log level, using default");
    }
    Ok(installed)
}
