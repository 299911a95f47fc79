//! Listeners of the Stockgate gateway
//!
//! The REST API is served by axum, the subscription socket by
//! tokio-tungstenite. Both implement [`Server`] and stop on a shared
//! `CancellationToken`; [`CombinedServer`] runs them as one unit.

#![allow(clippy::result_large_err)]

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod port_validator;
pub mod shutdown;
pub mod traits;
pub mod websocket;

pub use config::{ports, ServerConfig};
pub use error::{Result, ServerError};
pub use health::{ComponentStatus, HealthState};
pub use http::HttpServer;
pub use port_validator::validate_ports_available;
pub use shutdown::ShutdownController;
pub use traits::{Server, ServerExt};
pub use websocket::{ConnectionId, MessageHandler, Outbound, WebSocketServer};

/// REST API and subscription socket sharing one lifetime
///
/// The first listener to stop for any reason takes the other one down.
pub struct CombinedServer {
    name: String,
    config: ServerConfig,
    http: Option<HttpServer>,
    ws: Option<WebSocketServer>,
}

impl CombinedServer {
    pub fn new(
        name: impl Into<String>,
        config: ServerConfig,
        router: axum::Router,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            http: config
                .http_port
                .map(|_| HttpServer::new(config.clone(), router)),
            ws: config
                .websocket_port
                .map(|_| WebSocketServer::from_arc(config.clone(), handler)),
            config,
        }
    }

    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.ws = self.ws.map(|ws| ws.with_outbound_buffer(capacity));
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn validate_ports(&self) -> Result<()> {
        validate_ports_available(&self.config).await
    }

    fn launch(&self, stop: &CancellationToken) -> JoinSet<(&'static str, Result<()>)> {
        let mut tasks = JoinSet::new();
        if let Some(http) = self.http.clone() {
            let stop = stop.child_token();
            tasks.spawn(async move { ("http", http.run(stop).await) });
        }
        if let Some(ws) = self.ws.clone() {
            let stop = stop.child_token();
            tasks.spawn(async move { ("websocket", ws.run(stop).await) });
        }
        tasks
    }
}

fn report_exit(joined: std::result::Result<(&'static str, Result<()>), tokio::task::JoinError>) {
    match joined {
        Ok((listener, Ok(()))) => info!(listener, "Listener stopped"),
        Ok((listener, Err(e))) => error!(listener, error = %e, "Listener failed"),
        Err(e) => error!(error = %e, "Listener task panicked"),
    }
}

#[async_trait::async_trait]
impl Server for CombinedServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Option<SocketAddr> {
        let http = self.http.as_ref().and_then(Server::address);
        http.or_else(|| self.ws.as_ref().and_then(Server::address))
    }

    fn is_running(&self) -> bool {
        self.http.as_ref().is_some_and(Server::is_running)
            || self.ws.as_ref().is_some_and(Server::is_running)
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut tasks = self.launch(&shutdown);
        if tasks.is_empty() {
            warn!(server = %self.name, "Neither listener is configured");
            return Ok(());
        }
        info!(server = %self.name, listeners = tasks.len(), "Gateway listeners started");

        tokio::select! {
            _ = shutdown.cancelled() => {}
            Some(first) = tasks.join_next() => {
                warn!(server = %self.name, "A listener stopped on its own, stopping the rest");
                report_exit(first);
                shutdown.cancel();
            }
        }

        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                report_exit(joined);
            }
        })
        .await;
        if drained.is_err() {
            warn!(timeout = ?self.config.shutdown_timeout, "Listeners did not stop in time");
            tasks.abort_all();
        }

        info!(server = %self.name, "Gateway stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::routing::get;
    use std::time::Duration;
    use websocket::Message;

    struct Mute;

    #[async_trait]
    impl MessageHandler for Mute {
        async fn handle(&self, _conn_id: ConnectionId, _message: Message) -> Option<Message> {
            None
        }
    }

    fn gateway(config: ServerConfig) -> CombinedServer {
        let router = axum::Router::new().route("/health", get(health::simple_health_handler));
        CombinedServer::new("gateway-test", config, router, Arc::new(Mute))
    }

    #[tokio::test]
    async fn test_both_listeners_stop_on_cancel() {
        let (handle, stop) = gateway(ServerConfig::new("127.0.0.1", 0, 0)).spawn();
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.cancel();

        let joined = tokio::time::timeout(Duration::from_secs(10), handle).await;
        assert!(joined.is_ok());
    }

    #[tokio::test]
    async fn test_failed_bind_takes_down_the_other_listener() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();
        let config = ServerConfig::new("127.0.0.1", port, 0)
            .with_shutdown_timeout(Duration::from_secs(5));

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            gateway(config).run(CancellationToken::new()),
        )
        .await;
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_only_configured_listeners_are_built() {
        let server = gateway(ServerConfig::http_only("127.0.0.1", 8080));
        assert!(server.http.is_some());
        assert!(server.ws.is_none());
        assert!(!server.is_running());
    }
}
