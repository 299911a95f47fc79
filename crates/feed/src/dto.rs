//! Outward views of stored records
//!
//! These are what the HTTP API returns and what subscribers receive. Each view
//! carries the ticker and symbol name next to the numeric identity so clients
//! never need a second lookup. Decimals are emitted as JSON numbers.

use chrono::{DateTime, Utc};
use common::{Alert, AlertType, AssetType, PriceObservation, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A registered symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDto {
    pub id: i64,
    pub ticker: String,
    pub name: String,
    pub asset_type: AssetType,
    pub created_at: DateTime<Utc>,
}

impl From<Symbol> for SymbolDto {
    fn from(symbol: Symbol) -> Self {
        Self {
            id: symbol.id,
            ticker: symbol.ticker,
            name: symbol.name,
            asset_type: symbol.asset_type,
            created_at: symbol.created_at,
        }
    }
}

/// A persisted price observation joined with its symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDto {
    pub id: i64,
    pub ticker: String,
    pub symbol_name: String,
    pub asset_type: AssetType,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub volume: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub moving_average_5: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub moving_average_20: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub percent_change: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl PriceDto {
    pub fn new(observation: PriceObservation, symbol: &Symbol) -> Self {
        Self {
            id: observation.id,
            ticker: symbol.ticker.clone(),
            symbol_name: symbol.name.clone(),
            asset_type: symbol.asset_type,
            price: observation.price,
            volume: observation.volume,
            moving_average_5: observation.moving_average_5,
            moving_average_20: observation.moving_average_20,
            percent_change: observation.percent_change,
            timestamp: observation.timestamp,
        }
    }
}

/// A triggered alert joined with its symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDto {
    pub id: i64,
    pub ticker: String,
    pub symbol_name: String,
    pub alert_type: AlertType,
    pub message: String,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub trigger_value: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub threshold_value: Option<Decimal>,
    pub is_read: bool,
    pub timestamp: DateTime<Utc>,
}

impl AlertDto {
    pub fn new(alert: Alert, symbol: &Symbol) -> Self {
        Self {
            id: alert.id,
            ticker: symbol.ticker.clone(),
            symbol_name: symbol.name.clone(),
            alert_type: alert.alert_type,
            message: alert.message,
            trigger_value: alert.trigger_value,
            threshold_value: alert.threshold_value,
            is_read: alert.is_read,
            timestamp: alert.timestamp,
        }
    }
}
