//! Configuration loading.
//!
//! Sources are merged in this order (later sources override earlier):
//! 1. Built-in defaults and defaults registered on the loader
//! 2. `config.<environment>.toml` from the config directory
//! 3. Environment variables (`SERVER_ENV`, `DEBUG`, ... and `APP_`-prefixed nested keys)
//! 4. An explicitly selected environment (`--environment`)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::Serialize;

use crate::config::provider::Config;
use crate::config::schema::{
    ServerConfig, DEBUG_KEY, DEFAULT_ENVIRONMENT, ENVIRONMENT_KEY, TELEMETRY_ENABLED_KEY,
};
use crate::config::validation::ValidationError;

/// Top-level keys that plain environment variables may override.
const ENV_KEYS: &[&str] = &[
    ENVIRONMENT_KEY,
    DEBUG_KEY,
    TELEMETRY_ENABLED_KEY,
    "name",
    "version",
];

/// Prefix for environment variables overriding nested keys (`APP_SERVER__PORT`).
pub const ENV_PREFIX: &str = "APP_";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {} not found", path.display())]
    Missing { path: PathBuf },

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse error in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration value: {0}")]
    Extract(#[from] figment::Error),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds a [`Config`] from defaults, the environment's file and env vars.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    defaults: Figment,
    environment: Option<String>,
    read_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader reading `./config/` with the built-in defaults.
    pub fn new() -> Self {
        let server = ServerConfig::default();
        let defaults = Figment::new()
            .merge(Serialized::default(ENVIRONMENT_KEY, DEFAULT_ENVIRONMENT))
            .merge(Serialized::default(DEBUG_KEY, true))
            .merge(Serialized::default(TELEMETRY_ENABLED_KEY, false))
            .merge(Serialized::default("server", server));

        Self {
            config_dir: PathBuf::from("config"),
            defaults,
            environment: None,
            read_env: true,
        }
    }

    /// Directory holding `config.<environment>.toml` files.
    pub fn with_config_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Register a default value for `key`.
    pub fn with_default<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.defaults = self.defaults.merge(Serialized::default(key, value));
        self
    }

    /// Force the environment name, overriding `SERVER_ENV`.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Skip the environment variable overlay.
    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Path of the config file for `environment`.
    pub fn config_path(&self, environment: &str) -> PathBuf {
        self.config_dir.join(format!("config.{environment}.toml"))
    }

    /// Configuration made of the registered defaults only.
    pub fn defaults(&self) -> Config {
        Config::from_figment(self.defaults.clone())
    }

    /// Load configuration from all sources.
    ///
    /// A missing file is only tolerated for the default environment.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let environment: String = self
            .overlay(self.defaults.clone())
            .extract_inner(ENVIRONMENT_KEY)?;
        let path = self.config_path(&environment);

        let mut figment = self.defaults.clone();
        match fs::read_to_string(&path) {
            Ok(content) => {
                let table: toml::Table = toml::from_str(&content).map_err(|source| {
                    ConfigError::Parse {
                        path: path.clone(),
                        source,
                    }
                })?;
                figment = figment.merge(Serialized::defaults(table));
                tracing::debug!(path = %path.display(), "Config file loaded");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if environment != DEFAULT_ENVIRONMENT {
                    return Err(ConfigError::Missing { path });
                }
                tracing::debug!(path = %path.display(), "Config file missing, using defaults");
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        }

        Ok(Config::from_figment(self.overlay(figment)))
    }

    fn overlay(&self, mut figment: Figment) -> Figment {
        if self.read_env {
            figment = figment
                .merge(Env::raw().only(ENV_KEYS))
                .merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        if let Some(environment) = &self.environment {
            figment = figment.merge(Serialized::default(ENVIRONMENT_KEY, environment.as_str()));
        }
        figment
    }
}
