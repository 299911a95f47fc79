//! Database row models
//!
//! These structs map directly to the PostgreSQL rows and convert into the
//! domain records in `common`.

use chrono::{DateTime, Utc};
use common::{Alert, AlertType, AssetType, PriceObservation, Symbol};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::{Result, StorageError};

/// Row of the `symbols` table
#[derive(Debug, Clone, FromRow)]
pub struct SymbolRow {
    pub id: i64,
    pub ticker: String,
    pub name: String,
    pub asset_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SymbolRow {
    pub fn into_domain(self) -> Result<Symbol> {
        let asset_type = AssetType::parse(&self.asset_type).ok_or_else(|| {
            StorageError::Decode(format!(
                "symbol {} has unknown asset type '{}'",
                self.id, self.asset_type
            ))
        })?;

        Ok(Symbol {
            id: self.id,
            ticker: self.ticker,
            name: self.name,
            asset_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row of the `price_history` table
#[derive(Debug, Clone, FromRow)]
pub struct PriceRow {
    pub id: i64,
    pub symbol_id: i64,
    pub price: Decimal,
    pub volume: Option<Decimal>,
    pub moving_average_5: Option<Decimal>,
    pub moving_average_20: Option<Decimal>,
    pub percent_change: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<PriceRow> for PriceObservation {
    fn from(row: PriceRow) -> Self {
        PriceObservation {
            id: row.id,
            symbol_id: row.symbol_id,
            price: row.price,
            volume: row.volume,
            moving_average_5: row.moving_average_5,
            moving_average_20: row.moving_average_20,
            percent_change: row.percent_change,
            timestamp: row.timestamp,
            created_at: row.created_at,
        }
    }
}

/// Row of the `alerts` table
#[derive(Debug, Clone, FromRow)]
pub struct AlertRow {
    pub id: i64,
    pub symbol_id: i64,
    pub alert_type: String,
    pub message: String,
    pub trigger_value: Option<Decimal>,
    pub threshold_value: Option<Decimal>,
    pub is_read: bool,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AlertRow {
    pub fn into_domain(self) -> Result<Alert> {
        let alert_type = AlertType::parse(&self.alert_type).ok_or_else(|| {
            StorageError::Decode(format!(
                "alert {} has unknown type '{}'",
                self.id, self.alert_type
            ))
        })?;

        Ok(Alert {
            id: self.id,
            symbol_id: self.symbol_id,
            alert_type,
            message: self.message,
            trigger_value: self.trigger_value,
            threshold_value: self.threshold_value,
            is_read: self.is_read,
            timestamp: self.timestamp,
            created_at: self.created_at,
        })
    }
}
