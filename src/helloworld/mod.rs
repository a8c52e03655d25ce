//! Sample service: `GET /helloworld?name=<name>`.
//!
//! Shows the two ways a handler answers: a plain value, or an [`AppError`]
//! wrapping an internal cause that the recovery middleware renders.

use async_trait::async_trait;
use axum::extract::Query;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::error::{AppError, ResultExt};
use crate::service::Service;

/// Name that makes the handler fail, for trying out error rendering.
pub const ERROR_NAME: &str = "error";

#[derive(Debug, Clone, Copy, Default)]
pub struct HelloWorld;

impl HelloWorld {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Service for HelloWorld {
    fn name(&self) -> &str {
        "helloworld"
    }

    fn register_routes(&self, router: Router) -> Router {
        router.route("/helloworld", get(say_hello))
    }
}

#[derive(Debug, Deserialize)]
struct HelloQuery {
    name: Option<String>,
}

async fn say_hello(Query(query): Query<HelloQuery>) -> Result<String, AppError> {
    let name = query.name.as_deref().unwrap_or("World");
    greet(name).app_err("This sample error to client")
}

fn greet(name: &str) -> anyhow::Result<String> {
    if name == ERROR_NAME {
        anyhow::bail!("This is inner error");
    }
    Ok(format!("Hello {name}"))
}
