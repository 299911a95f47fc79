//! Store trait definitions
//!
//! These traits allow the in-memory and PostgreSQL back ends to be swapped
//! without changing the ingestion pipeline or the query services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Alert, AlertId, AlertType, NewAlert, NewPriceObservation, NewSymbol, PriceObservation, Symbol,
    SymbolId,
};

use crate::Result;

/// Registry of tradable symbols keyed by upper-cased ticker
#[async_trait]
pub trait SymbolStore: Send + Sync {
    /// Exact lookup by an already normalised ticker
    async fn find_by_ticker(&self, ticker: &str) -> Result<Option<Symbol>>;

    /// Lookup by identity
    async fn get(&self, id: SymbolId) -> Result<Option<Symbol>>;

    /// Insert a new symbol
    ///
    /// Fails with [`StorageError::Duplicate`](crate::StorageError::Duplicate) when
    /// the ticker is already registered. The check and the insert are atomic.
    async fn insert(&self, symbol: NewSymbol) -> Result<Symbol>;

    /// All symbols, ascending by id
    async fn list(&self) -> Result<Vec<Symbol>>;
}

/// Append-only time series of price observations
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Persist an observation and assign its id
    async fn append(&self, observation: NewPriceObservation) -> Result<PriceObservation>;

    /// Latest observation of every symbol that has any, ascending by symbol id
    ///
    /// "Latest" is the maximum timestamp; ties go to the highest id.
    async fn latest_all(&self) -> Result<Vec<PriceObservation>>;

    /// Latest observation of one symbol
    async fn latest(&self, symbol_id: SymbolId) -> Result<Option<PriceObservation>>;

    /// At most `limit` observations, newest first
    async fn history(&self, symbol_id: SymbolId, limit: usize) -> Result<Vec<PriceObservation>>;

    /// Every observation with `timestamp >= since`, newest first
    async fn recent_since(
        &self,
        symbol_id: SymbolId,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>>;
}

/// Append-only alert log with read/unread state
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persist an alert, unread
    async fn append(&self, alert: NewAlert) -> Result<Alert>;

    /// Alerts with `timestamp >= since`, newest first
    async fn recent_since(&self, since: DateTime<Utc>) -> Result<Vec<Alert>>;

    /// Unread alerts, newest first
    async fn unread(&self) -> Result<Vec<Alert>>;

    /// At most `limit` alerts of one symbol, newest first
    async fn by_symbol(&self, symbol_id: SymbolId, limit: usize) -> Result<Vec<Alert>>;

    /// At most `limit` alerts of one type, newest first
    async fn by_type(&self, alert_type: AlertType, limit: usize) -> Result<Vec<Alert>>;

    /// Flag one alert as read
    ///
    /// Returns whether the alert exists. Unknown ids are not an error.
    async fn mark_read(&self, id: AlertId) -> Result<bool>;

    /// Flag every unread alert as read, returning how many flipped
    async fn mark_all_read(&self) -> Result<u64>;

    async fn unread_count(&self) -> Result<u64>;
}
