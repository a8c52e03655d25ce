//! Contract implemented by pluggable services.

use async_trait::async_trait;
use axum::Router;

/// A unit of business functionality hosted by the server.
///
/// Services are registered in order; route registration, health checks and
/// cleanup all follow that order.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Name used in logs and health reports.
    fn name(&self) -> &str;

    /// Attach this service's endpoints.
    fn register_routes(&self, router: Router) -> Router;

    /// Liveness check. Defaults to healthy.
    async fn health(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release resources before the engine shuts down.
    async fn clean(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
