//! Built-in endpoints registered before any service routes.
//!
//! - `GET /health`: runs every service's health check, in registration order
//! - `GET /`: application name and version from configuration

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::config::Config;
use crate::error::{AppError, Error};
use crate::service::Service;

/// State shared by the built-in handlers.
#[derive(Clone)]
pub struct HostState {
    config: Arc<Config>,
    services: Arc<[Arc<dyn Service>]>,
}

impl HostState {
    pub fn new(config: Arc<Config>, services: &[Arc<dyn Service>]) -> Self {
        Self {
            config,
            services: services.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub app: String,
    pub version: String,
}

/// First failing service short-circuits with a 500.
pub async fn health(State(state): State<HostState>) -> Result<Json<HealthReport>, Error> {
    for service in state.services.iter() {
        if let Err(e) = service.health().await {
            tracing::error!(service = service.name(), error = ?e, "Service health error");
            return Err(AppError::wrap(e, format!("service {} is unhealthy", service.name())).into());
        }
    }
    Ok(Json(HealthReport { status: "healthy" }))
}

pub async fn info(State(state): State<HostState>) -> Json<AppInfo> {
    Json(AppInfo {
        app: state.config.get_string("name"),
        version: state.config.get_string("version"),
    })
}
