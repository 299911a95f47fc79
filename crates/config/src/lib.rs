//! Stockgate configuration
//!
//! The configuration is a single YAML document. Every section is optional and
//! falls back to the values in [`defaults`]. `${VAR}` placeholders are
//! substituted from the environment before parsing.

use common::AssetType;
use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Root of the configuration file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Symbols registered at startup; existing tickers are skipped
    #[serde(default)]
    pub symbols: Vec<SymbolSeed>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

/// Listener settings for the HTTP and WebSocket servers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            websocket_port: default_websocket_port(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
    pub url: String,
    /// Pool size; [`default_max_connections`] when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl PostgresConfig {
    pub fn max_connections(&self) -> u32 {
        self.max_connections.unwrap_or_else(default_max_connections)
    }
}

/// Defaults and caps for the query surface
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    #[serde(default = "default_history_limit")]
    pub default_history_limit: usize,
    #[serde(default = "default_max_history_limit")]
    pub max_history_limit: usize,
    #[serde(default = "default_window_hours")]
    pub default_window_hours: i64,
    #[serde(default = "default_alert_limit")]
    pub default_alert_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_history_limit: default_history_limit(),
            max_history_limit: default_max_history_limit(),
            default_window_hours: default_window_hours(),
            default_alert_limit: default_alert_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastConfig {
    /// Capacity of each subscriber's outbound queue
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// One of `pretty`, `json`, `compact`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Prometheus exporter port; disabled when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            metrics_port: None,
        }
    }
}

/// A symbol to register at startup
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SymbolSeed {
    pub ticker: String,
    pub name: String,
    pub asset_type: AssetType,
}
