//! Server configuration
//!
//! Listener settings for the HTTP and WebSocket servers and the default
//! port assignments.

use crate::error::{Result, ServerError};
use std::net::SocketAddr;
use std::time::Duration;

/// Default port assignments
pub mod ports {
    /// REST API and ingestion endpoint
    pub const HTTP: u16 = 8080;
    /// Real-time subscription endpoint
    pub const WEBSOCKET: u16 = 7080;
    /// Prometheus exporter
    pub const METRICS: u16 = 9090;
}

/// Listener configuration for both protocols
///
/// Each port is optional, so either server can run alone.
///
/// ```
/// use server::config::ServerConfig;
///
/// let config = ServerConfig::new("0.0.0.0", 8080, 7080);
/// let http_only = ServerConfig::http_only("127.0.0.1", 8080);
/// assert!(http_only.websocket_port.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g. "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub http_port: Option<u16>,
    pub websocket_port: Option<u16>,
    /// How long to wait for servers to drain on shutdown
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, http: u16, ws: u16) -> Self {
        Self {
            host: host.into(),
            http_port: Some(http),
            websocket_port: Some(ws),
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    pub fn http_only(host: impl Into<String>, port: u16) -> Self {
        Self {
            websocket_port: None,
            ..Self::new(host, port, 0)
        }
    }

    pub fn websocket_only(host: impl Into<String>, port: u16) -> Self {
        Self {
            http_port: None,
            ..Self::new(host, 0, port)
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn http_addr(&self) -> Option<Result<SocketAddr>> {
        self.http_port.map(|p| self.parse_addr(p))
    }

    pub fn websocket_addr(&self) -> Option<Result<SocketAddr>> {
        self.websocket_port.map(|p| self.parse_addr(p))
    }

    /// Check if any servers are configured
    pub fn has_servers(&self) -> bool {
        self.http_port.is_some() || self.websocket_port.is_some()
    }

    fn parse_addr(&self, port: u16) -> Result<SocketAddr> {
        let host = if self.host == "localhost" {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ServerError::Address(format!("{}:{}", self.host, port)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("0.0.0.0", ports::HTTP, ports::WEBSOCKET)
    }
}
