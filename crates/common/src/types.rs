//! Domain records shared across Stockgate
//!
//! Records are created through the `New*` constructors, which stamp their
//! receipt timestamps once. Stores assign the numeric identity on append.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Server-assigned identity of a symbol
pub type SymbolId = i64;

/// Server-assigned identity of a price observation
pub type PriceId = i64;

/// Server-assigned identity of an alert
pub type AlertId = i64;

/// Maximum ticker length accepted by the directory
pub const MAX_TICKER_LEN: usize = 20;

/// Maximum display name length accepted by the directory
pub const MAX_SYMBOL_NAME_LEN: usize = 100;

/// Maximum alert message length kept by the alert store
pub const MAX_ALERT_MESSAGE_LEN: usize = 500;

/// Canonical form of a ticker: trimmed and upper-cased
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Kind of tradable instrument a symbol refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Stock,
    Crypto,
    Etf,
    Forex,
}

impl AssetType {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "STOCK",
            AssetType::Crypto => "CRYPTO",
            AssetType::Etf => "ETF",
            AssetType::Forex => "FOREX",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STOCK" => Some(AssetType::Stock),
            "CRYPTO" => Some(AssetType::Crypto),
            "ETF" => Some(AssetType::Etf),
            "FOREX" => Some(AssetType::Forex),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown asset type: {}", s))
    }
}

/// Category of a triggered alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    SpikeUp,
    SpikeDown,
    Anomaly,
    ThresholdBreach,
    VolumeSurge,
}

impl AlertType {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::SpikeUp => "SPIKE_UP",
            AlertType::SpikeDown => "SPIKE_DOWN",
            AlertType::Anomaly => "ANOMALY",
            AlertType::ThresholdBreach => "THRESHOLD_BREACH",
            AlertType::VolumeSurge => "VOLUME_SURGE",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SPIKE_UP" => Some(AlertType::SpikeUp),
            "SPIKE_DOWN" => Some(AlertType::SpikeDown),
            "ANOMALY" => Some(AlertType::Anomaly),
            "THRESHOLD_BREACH" => Some(AlertType::ThresholdBreach),
            "VOLUME_SURGE" => Some(AlertType::VolumeSurge),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown alert type: {}", s))
    }
}

/// A registered tradable symbol
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub id: SymbolId,
    /// Unique, upper-cased ticker
    pub ticker: String,
    pub name: String,
    pub asset_type: AssetType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A symbol waiting to be registered
#[derive(Debug, Clone, PartialEq)]
pub struct NewSymbol {
    pub ticker: String,
    pub name: String,
    pub asset_type: AssetType,
    pub created_at: DateTime<Utc>,
}

impl NewSymbol {
    /// Normalise the ticker and stamp the creation time
    pub fn new(ticker: &str, name: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            ticker: normalize_ticker(ticker),
            name: name.into().trim().to_string(),
            asset_type,
            created_at: Utc::now(),
        }
    }

    /// Materialise with a store-assigned identity
    pub fn into_symbol(self, id: SymbolId) -> Symbol {
        Symbol {
            id,
            ticker: self.ticker,
            name: self.name,
            asset_type: self.asset_type,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// One persisted price/volume/derived-metric data point
#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub id: PriceId,
    pub symbol_id: SymbolId,
    pub price: Decimal,
    pub volume: Option<Decimal>,
    pub moving_average_5: Option<Decimal>,
    pub moving_average_20: Option<Decimal>,
    pub percent_change: Option<Decimal>,
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Server receipt time
    pub created_at: DateTime<Utc>,
}

/// A price observation waiting to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewPriceObservation {
    pub symbol_id: SymbolId,
    pub price: Decimal,
    pub volume: Option<Decimal>,
    pub moving_average_5: Option<Decimal>,
    pub moving_average_20: Option<Decimal>,
    pub percent_change: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewPriceObservation {
    /// Create an observation; a missing observation time defaults to now
    pub fn new(symbol_id: SymbolId, price: Decimal, timestamp: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            symbol_id,
            price,
            volume: None,
            moving_average_5: None,
            moving_average_20: None,
            percent_change: None,
            timestamp: timestamp.unwrap_or(now),
            created_at: now,
        }
    }

    pub fn with_volume(mut self, volume: Option<Decimal>) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_moving_averages(mut self, ma5: Option<Decimal>, ma20: Option<Decimal>) -> Self {
        self.moving_average_5 = ma5;
        self.moving_average_20 = ma20;
        self
    }

    pub fn with_percent_change(mut self, percent_change: Option<Decimal>) -> Self {
        self.percent_change = percent_change;
        self
    }

    /// Materialise with a store-assigned identity
    pub fn into_observation(self, id: PriceId) -> PriceObservation {
        PriceObservation {
            id,
            symbol_id: self.symbol_id,
            price: self.price,
            volume: self.volume,
            moving_average_5: self.moving_average_5,
            moving_average_20: self.moving_average_20,
            percent_change: self.percent_change,
            timestamp: self.timestamp,
            created_at: self.created_at,
        }
    }
}

/// A triggered alert
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: AlertId,
    pub symbol_id: SymbolId,
    pub alert_type: AlertType,
    pub message: String,
    /// Value that caused the alert (the observed price)
    pub trigger_value: Option<Decimal>,
    /// Reference value (the observed percent change)
    pub threshold_value: Option<Decimal>,
    /// The only field that changes after creation
    pub is_read: bool,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// An alert waiting to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub symbol_id: SymbolId,
    pub alert_type: AlertType,
    pub message: String,
    pub trigger_value: Option<Decimal>,
    pub threshold_value: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewAlert {
    /// Create an unread alert stamped with the current time
    pub fn new(
        symbol_id: SymbolId,
        alert_type: AlertType,
        message: impl Into<String>,
        trigger_value: Option<Decimal>,
        threshold_value: Option<Decimal>,
    ) -> Self {
        let now = Utc::now();
        let mut message: String = message.into();
        if message.chars().count() > MAX_ALERT_MESSAGE_LEN {
            message = message.chars().take(MAX_ALERT_MESSAGE_LEN).collect();
        }
        Self {
            symbol_id,
            alert_type,
            message,
            trigger_value,
            threshold_value,
            timestamp: now,
            created_at: now,
        }
    }

    /// Materialise with a store-assigned identity
    pub fn into_alert(self, id: AlertId) -> Alert {
        Alert {
            id,
            symbol_id: self.symbol_id,
            alert_type: self.alert_type,
            message: self.message,
            trigger_value: self.trigger_value,
            threshold_value: self.threshold_value,
            is_read: false,
            timestamp: self.timestamp,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker("btc"), "BTC");
        assert_eq!(normalize_ticker("  aapl "), "AAPL");
    }

    #[test]
    fn test_asset_type_parse() {
        assert_eq!(AssetType::parse("crypto"), Some(AssetType::Crypto));
        assert_eq!(AssetType::parse("ETF"), Some(AssetType::Etf));
        assert_eq!(AssetType::parse("bond"), None);
        assert!("forex".parse::<AssetType>().is_ok());
    }

    #[test]
    fn test_alert_type_serde() {
        let json = serde_json::to_string(&AlertType::VolumeSurge).unwrap();
        assert_eq!(json, "\"VOLUME_SURGE\"");

        let parsed: AlertType = serde_json::from_str("\"SPIKE_DOWN\"").unwrap();
        assert_eq!(parsed, AlertType::SpikeDown);
    }

    #[test]
    fn test_new_price_defaults_timestamp() {
        let obs = NewPriceObservation::new(1, Decimal::new(150, 0), None);
        assert_eq!(obs.timestamp, obs.created_at);

        let ts = Utc::now() - chrono::Duration::hours(1);
        let obs = NewPriceObservation::new(1, Decimal::new(150, 0), Some(ts));
        assert_eq!(obs.timestamp, ts);
        assert!(obs.created_at > ts);
    }

    #[test]
    fn test_new_alert_is_unread() {
        let alert = NewAlert::new(3, AlertType::Anomaly, "odd", None, None).into_alert(9);
        assert_eq!(alert.id, 9);
        assert!(!alert.is_read);
        assert_eq!(alert.timestamp, alert.created_at);
    }

    #[test]
    fn test_new_alert_truncates_message() {
        let long = "x".repeat(MAX_ALERT_MESSAGE_LEN + 20);
        let alert = NewAlert::new(1, AlertType::Anomaly, long, None, None);
        assert_eq!(alert.message.len(), MAX_ALERT_MESSAGE_LEN);
    }
}
