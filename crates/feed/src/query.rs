//! Read side of the gateway: prices, symbols and alerts as outward views

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{AlertId, AlertType, GatewayError, Result, Symbol, SymbolId};
use std::collections::HashMap;
use std::sync::Arc;
use storage::{AlertStore, PriceStore};
use tracing::info;

use crate::broadcast::SnapshotSource;
use crate::directory::SymbolDirectory;
use crate::dto::{AlertDto, PriceDto};

/// Defaults and caps applied to caller-supplied limits and windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_history_limit: usize,
    pub max_history_limit: usize,
    pub default_window_hours: i64,
    pub default_alert_limit: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_history_limit: 100,
            max_history_limit: 1000,
            default_window_hours: 24,
            default_alert_limit: 50,
        }
    }
}

impl QueryLimits {
    /// History row limit: default when absent, capped at the maximum
    pub fn history_limit(&self, requested: Option<usize>) -> Result<usize> {
        resolve_limit(requested, self.default_history_limit, self.max_history_limit)
    }

    /// Alert row limit: default when absent, capped at the maximum
    pub fn alert_limit(&self, requested: Option<usize>) -> Result<usize> {
        resolve_limit(requested, self.default_alert_limit, self.max_history_limit)
    }

    /// Look-back window in hours, default when absent
    pub fn window_hours(&self, requested: Option<i64>) -> Result<i64> {
        match requested {
            None => Ok(self.default_window_hours),
            Some(hours) if hours > 0 => Ok(hours),
            Some(hours) => Err(GatewayError::invalid_input(format!(
                "hours must be positive, got {}",
                hours
            ))),
        }
    }
}

fn resolve_limit(requested: Option<usize>, default: usize, max: usize) -> Result<usize> {
    match requested {
        None => Ok(default.min(max)),
        Some(0) => Err(GatewayError::invalid_input("limit must be positive")),
        Some(limit) => Ok(limit.min(max)),
    }
}

/// Symbol lookup by id for a list of records
async fn symbols_by_id(directory: &SymbolDirectory) -> Result<HashMap<SymbolId, Symbol>> {
    Ok(directory
        .list()
        .await?
        .into_iter()
        .map(|symbol| (symbol.id, symbol))
        .collect())
}

/// Price queries
#[derive(Clone)]
pub struct PriceQueries {
    directory: SymbolDirectory,
    prices: Arc<dyn PriceStore>,
    limits: QueryLimits,
}

impl PriceQueries {
    pub fn new(directory: SymbolDirectory, prices: Arc<dyn PriceStore>, limits: QueryLimits) -> Self {
        Self {
            directory,
            prices,
            limits,
        }
    }

    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Latest observation of every symbol that has one, ascending symbol id
    pub async fn latest_prices(&self) -> Result<Vec<PriceDto>> {
        let latest = self.prices.latest_all().await?;
        if latest.is_empty() {
            return Ok(Vec::new());
        }

        let symbols = symbols_by_id(&self.directory).await?;
        Ok(latest
            .into_iter()
            .filter_map(|observation| {
                let symbol = symbols.get(&observation.symbol_id)?;
                Some(PriceDto::new(observation, symbol))
            })
            .collect())
    }

    /// Latest observation of one ticker; `NotFound` for an unknown ticker or
    /// a ticker without observations
    pub async fn latest_price(&self, ticker: &str) -> Result<PriceDto> {
        let symbol = self.directory.resolve(ticker).await?;
        self.latest_of(&symbol)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("No price data for {}", symbol.ticker)))
    }

    /// Newest-first history of one ticker
    pub async fn history(&self, ticker: &str, limit: Option<usize>) -> Result<Vec<PriceDto>> {
        let limit = self.limits.history_limit(limit)?;
        let symbol = self.directory.resolve(ticker).await?;
        let history = self.prices.history(symbol.id, limit).await?;
        Ok(history
            .into_iter()
            .map(|observation| PriceDto::new(observation, &symbol))
            .collect())
    }

    /// Observations of one ticker from the last `hours` hours, newest first
    pub async fn variations(&self, ticker: &str, hours: Option<i64>) -> Result<Vec<PriceDto>> {
        let hours = self.limits.window_hours(hours)?;
        let symbol = self.directory.resolve(ticker).await?;
        let since = Utc::now() - Duration::hours(hours);
        let recent = self.prices.recent_since(symbol.id, since).await?;
        Ok(recent
            .into_iter()
            .map(|observation| PriceDto::new(observation, &symbol))
            .collect())
    }

    async fn latest_of(&self, symbol: &Symbol) -> Result<Option<PriceDto>> {
        Ok(self
            .prices
            .latest(symbol.id)
            .await?
            .map(|observation| PriceDto::new(observation, symbol)))
    }
}

#[async_trait]
impl SnapshotSource for PriceQueries {
    async fn latest_all(&self) -> Result<Vec<PriceDto>> {
        self.latest_prices().await
    }

    async fn latest_for(&self, ticker: &str) -> Result<Option<PriceDto>> {
        let symbol = self.directory.resolve(ticker).await?;
        self.latest_of(&symbol).await
    }
}

/// Alert queries and read-state changes
#[derive(Clone)]
pub struct AlertQueries {
    directory: SymbolDirectory,
    alerts: Arc<dyn AlertStore>,
    limits: QueryLimits,
}

impl AlertQueries {
    pub fn new(directory: SymbolDirectory, alerts: Arc<dyn AlertStore>, limits: QueryLimits) -> Self {
        Self {
            directory,
            alerts,
            limits,
        }
    }

    /// Alerts from the last `hours` hours, newest first
    pub async fn recent(&self, hours: Option<i64>) -> Result<Vec<AlertDto>> {
        let hours = self.limits.window_hours(hours)?;
        let since = Utc::now() - Duration::hours(hours);
        let alerts = self.alerts.recent_since(since).await?;
        self.to_dtos(alerts).await
    }

    pub async fn unread(&self) -> Result<Vec<AlertDto>> {
        let alerts = self.alerts.unread().await?;
        self.to_dtos(alerts).await
    }

    pub async fn unread_count(&self) -> Result<u64> {
        Ok(self.alerts.unread_count().await?)
    }

    pub async fn by_symbol(&self, ticker: &str, limit: Option<usize>) -> Result<Vec<AlertDto>> {
        let limit = self.limits.alert_limit(limit)?;
        let symbol = self.directory.resolve(ticker).await?;
        let alerts = self.alerts.by_symbol(symbol.id, limit).await?;
        Ok(alerts
            .into_iter()
            .map(|alert| AlertDto::new(alert, &symbol))
            .collect())
    }

    /// Alerts of one type; the type name is case-insensitive
    pub async fn by_type(&self, alert_type: &str, limit: Option<usize>) -> Result<Vec<AlertDto>> {
        let alert_type = AlertType::parse(alert_type).ok_or_else(|| {
            GatewayError::invalid_input(format!("Unknown alert type: {}", alert_type))
        })?;
        let limit = self.limits.alert_limit(limit)?;
        let alerts = self.alerts.by_type(alert_type, limit).await?;
        self.to_dtos(alerts).await
    }

    /// Mark one alert read; false when no such alert exists
    pub async fn mark_read(&self, id: AlertId) -> Result<bool> {
        Ok(self.alerts.mark_read(id).await?)
    }

    /// Mark every alert read, returning how many changed
    pub async fn mark_all_read(&self) -> Result<u64> {
        let flipped = self.alerts.mark_all_read().await?;
        info!(flipped, "Marked all alerts read");
        Ok(flipped)
    }

    async fn to_dtos(&self, alerts: Vec<common::Alert>) -> Result<Vec<AlertDto>> {
        if alerts.is_empty() {
            return Ok(Vec::new());
        }
        let symbols = symbols_by_id(&self.directory).await?;
        Ok(alerts
            .into_iter()
            .filter_map(|alert| {
                let symbol = symbols.get(&alert.symbol_id)?;
                Some(AlertDto::new(alert, symbol))
            })
            .collect())
    }
}
