//! REST listener backed by axum

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::traits::Server;

/// Serves the gateway router on the configured HTTP port
///
/// The bound address is only known once `run` has bound the listener, which
/// matters when the configured port is 0.
#[derive(Clone)]
pub struct HttpServer {
    config: ServerConfig,
    router: Router,
    bound: Arc<Mutex<Option<SocketAddr>>>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, router: Router) -> Self {
        Self {
            config,
            router,
            bound: Arc::default(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    async fn listen(&self) -> Result<TcpListener> {
        let addr = match self.config.http_addr() {
            Some(addr) => addr?,
            None => return Err(ServerError::config("no HTTP port configured")),
        };

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;
        *self.bound.lock() = Some(listener.local_addr()?);
        Ok(listener)
    }
}

#[async_trait]
impl Server for HttpServer {
    fn name(&self) -> &str {
        "http"
    }

    fn address(&self) -> Option<SocketAddr> {
        *self.bound.lock()
    }

    fn is_running(&self) -> bool {
        self.bound.lock().is_some()
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.listen().await?;
        info!(addr = ?self.address(), "REST API listening");

        let served = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
        self.bound.lock().take();

        if let Err(e) = served {
            error!(error = %e, "REST API stopped with an error");
            return Err(e.into());
        }
        info!("REST API drained");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ServerExt;
    use axum::routing::get;
    use std::time::Duration;

    fn router() -> Router {
        Router::new().route("/health", get(crate::health::simple_health_handler))
    }

    #[tokio::test]
    async fn test_binds_then_drains_on_cancel() {
        let server = HttpServer::new(ServerConfig::http_only("127.0.0.1", 0), router());
        let probe = server.clone();
        let (handle, token) = server.spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(probe.is_running());
        assert_ne!(probe.address().map(|a| a.port()), Some(0));

        token.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(joined.is_ok());
        assert!(!probe.is_running());
    }

    #[tokio::test]
    async fn test_refuses_to_run_without_http_port() {
        let server = HttpServer::new(ServerConfig::websocket_only("127.0.0.1", 7080), router());
        let result = server.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(ServerError::Config(_))));
    }
}
