//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, connection limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the typed section

use std::fmt;

use crate::config::schema::ServerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub key: &'static str,
    pub message: &'static str,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Validate the `[server]` section.
pub fn validate_server(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.trim().is_empty() {
        errors.push(ValidationError {
            key: "server.host",
            message: "must not be empty",
        });
    }
    if config.max_connections == 0 {
        errors.push(ValidationError {
            key: "server.max_connections",
            message: "must be greater than zero",
        });
    }
    if config.shutdown_timeout_secs == 0 {
        errors.push(ValidationError {
            key: "server.shutdown_timeout_secs",
            message: "must be greater than zero",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
