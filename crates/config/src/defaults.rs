//! Default values used by `#[serde(default = ...)]` and `Default` impls

use common::AssetType;

use super::SymbolSeed;

pub const DEFAULT_CONFIG_PATH: &str = "config/stockgate.yaml";

pub fn default_service_name() -> String {
    "stockgate".to_string()
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    8080
}

pub fn default_websocket_port() -> u16 {
    7080
}

pub fn default_shutdown_timeout_secs() -> u64 {
    30
}

pub fn default_max_connections() -> u32 {
    20
}

pub fn default_run_migrations() -> bool {
    true
}

pub fn default_history_limit() -> usize {
    100
}

pub fn default_max_history_limit() -> usize {
    1000
}

pub fn default_window_hours() -> i64 {
    24
}

pub fn default_alert_limit() -> usize {
    50
}

pub fn default_subscriber_buffer() -> usize {
    256
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

/// Symbols written into a freshly generated configuration
pub fn default_symbols() -> Vec<SymbolSeed> {
    [
        ("AAPL", "Apple Inc.", AssetType::Stock),
        ("MSFT", "Microsoft Corporation", AssetType::Stock),
        ("BTC", "Bitcoin", AssetType::Crypto),
        ("ETH", "Ethereum", AssetType::Crypto),
    ]
    .into_iter()
    .map(|(ticker, name, asset_type)| SymbolSeed {
        ticker: ticker.to_string(),
        name: name.to_string(),
        asset_type,
    })
    .collect()
}
