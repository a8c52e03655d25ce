//! Read-only configuration handle.

use figment::Figment;
use serde::de::DeserializeOwned;

use crate::config::loader::{ConfigError, ConfigLoader};
use crate::config::schema::{
    ServerConfig, DEBUG_KEY, DEFAULT_ENVIRONMENT, ENVIRONMENT_KEY, TELEMETRY_ENABLED_KEY,
};
use crate::config::validation::validate_server;

/// Layered key/value configuration with typed getters.
///
/// Keys are `.`-separated paths (`server.port`). The plain getters follow
/// "zero value when missing" semantics; use [`Config::get`] to observe errors.
#[derive(Debug, Clone)]
pub struct Config {
    figment: Figment,
}

impl Default for Config {
    fn default() -> Self {
        ConfigLoader::new().defaults()
    }
}

impl Config {
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Deserialize the value at `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        Ok(self.figment.extract_inner(key)?)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).unwrap_or_default()
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).unwrap_or_default()
    }

    /// Whether `key` holds a value in any source.
    pub fn is_set(&self, key: &str) -> bool {
        self.figment.contains(key)
    }

    /// Deserialize an optional section. `Ok(None)` when the section is absent.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        if !self.is_set(key) {
            return Ok(None);
        }
        self.get(key).map(Some)
    }

    /// Environment name (`local`, `staging`, `production`, ...).
    pub fn environment(&self) -> String {
        self.get(ENVIRONMENT_KEY)
            .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
    }

    pub fn debug(&self) -> bool {
        self.get_bool(DEBUG_KEY)
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.get_bool(TELEMETRY_ENABLED_KEY)
    }

    /// Validated `[server]` section, defaulted when absent.
    pub fn server(&self) -> Result<ServerConfig, ConfigError> {
        let server = self
            .section::<ServerConfig>("server")?
            .unwrap_or_default();
        validate_server(&server).map_err(ConfigError::Validation)?;
        Ok(server)
    }
}
