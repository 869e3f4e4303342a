use crate::AppCore;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use super::router;

/// HTTP server wrapping the request boundary.
pub struct HttpServer {
    core: Arc<AppCore>,
}

impl HttpServer {
    pub fn new(core: Arc<AppCore>) -> Self {
        Self { core }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let app = router::build_router(self.core.clone());
        let addr = format!("{}:{}", self.core.config.host, self.core.config.port);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("HTTP server shutting down");
            })
            .await?;

        Ok(())
    }
}
