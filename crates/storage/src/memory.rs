//! In-memory store implementations for testing and development

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Alert, AlertId, AlertType, NewAlert, NewPriceObservation, NewSymbol, PriceObservation, Symbol,
    SymbolId,
};
use parking_lot::RwLock;

use crate::traits::{AlertStore, PriceStore, SymbolStore};
use crate::{Result, StorageError};

/// Newest first: timestamp descending, then id descending
fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, i64)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[derive(Default)]
struct SymbolTable {
    by_id: BTreeMap<SymbolId, Symbol>,
    by_ticker: HashMap<String, SymbolId>,
}

/// In-memory symbol directory
pub struct InMemorySymbolStore {
    table: RwLock<SymbolTable>,
    next_id: AtomicI64,
}

impl InMemorySymbolStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(SymbolTable::default()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemorySymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SymbolStore for InMemorySymbolStore {
    async fn find_by_ticker(&self, ticker: &str) -> Result<Option<Symbol>> {
        let table = self.table.read();
        Ok(table
            .by_ticker
            .get(ticker)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn get(&self, id: SymbolId) -> Result<Option<Symbol>> {
        Ok(self.table.read().by_id.get(&id).cloned())
    }

    async fn insert(&self, symbol: NewSymbol) -> Result<Symbol> {
        let mut table = self.table.write();
        if table.by_ticker.contains_key(&symbol.ticker) {
            return Err(StorageError::Duplicate(format!(
                "Symbol already exists: {}",
                symbol.ticker
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let symbol = symbol.into_symbol(id);
        table.by_ticker.insert(symbol.ticker.clone(), id);
        table.by_id.insert(id, symbol.clone());
        Ok(symbol)
    }

    async fn list(&self) -> Result<Vec<Symbol>> {
        Ok(self.table.read().by_id.values().cloned().collect())
    }
}

/// In-memory price time series, partitioned by symbol
pub struct InMemoryPriceStore {
    series: RwLock<BTreeMap<SymbolId, Vec<PriceObservation>>>,
    next_id: AtomicI64,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self {
            series: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryPriceStore {
    fn default() -> Self {
        Self::new()
    }
}

fn latest_of(series: &[PriceObservation]) -> Option<&PriceObservation> {
    series.iter().max_by_key(|p| (p.timestamp, p.id))
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn append(&self, observation: NewPriceObservation) -> Result<PriceObservation> {
        let mut series = self.series.write();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let observation = observation.into_observation(id);
        series
            .entry(observation.symbol_id)
            .or_default()
            .push(observation.clone());
        Ok(observation)
    }

    async fn latest_all(&self) -> Result<Vec<PriceObservation>> {
        let series = self.series.read();
        Ok(series
            .values()
            .filter_map(|s| latest_of(s).cloned())
            .collect())
    }

    async fn latest(&self, symbol_id: SymbolId) -> Result<Option<PriceObservation>> {
        let series = self.series.read();
        Ok(series.get(&symbol_id).and_then(|s| latest_of(s).cloned()))
    }

    async fn history(&self, symbol_id: SymbolId, limit: usize) -> Result<Vec<PriceObservation>> {
        let mut result: Vec<PriceObservation> = self
            .series
            .read()
            .get(&symbol_id)
            .cloned()
            .unwrap_or_default();
        newest_first(&mut result, |p| (p.timestamp, p.id));
        result.truncate(limit);
        Ok(result)
    }

    async fn recent_since(
        &self,
        symbol_id: SymbolId,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>> {
        let mut result: Vec<PriceObservation> = self
            .series
            .read()
            .get(&symbol_id)
            .map(|s| s.iter().filter(|p| p.timestamp >= since).cloned().collect())
            .unwrap_or_default();
        newest_first(&mut result, |p| (p.timestamp, p.id));
        Ok(result)
    }
}

/// In-memory alert log
pub struct InMemoryAlertStore {
    alerts: RwLock<BTreeMap<AlertId, Alert>>,
    next_id: AtomicI64,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn select(&self, filter: impl Fn(&Alert) -> bool, limit: Option<usize>) -> Vec<Alert> {
        let mut result: Vec<Alert> = self
            .alerts
            .read()
            .values()
            .filter(|a| filter(a))
            .cloned()
            .collect();
        newest_first(&mut result, |a| (a.timestamp, a.id));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        result
    }
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn append(&self, alert: NewAlert) -> Result<Alert> {
        let mut alerts = self.alerts.write();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let alert = alert.into_alert(id);
        alerts.insert(id, alert.clone());
        Ok(alert)
    }

    async fn recent_since(&self, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        Ok(self.select(|a| a.timestamp >= since, None))
    }

    async fn unread(&self) -> Result<Vec<Alert>> {
        Ok(self.select(|a| !a.is_read, None))
    }

    async fn by_symbol(&self, symbol_id: SymbolId, limit: usize) -> Result<Vec<Alert>> {
        Ok(self.select(|a| a.symbol_id == symbol_id, Some(limit)))
    }

    async fn by_type(&self, alert_type: AlertType, limit: usize) -> Result<Vec<Alert>> {
        Ok(self.select(|a| a.alert_type == alert_type, Some(limit)))
    }

    async fn mark_read(&self, id: AlertId) -> Result<bool> {
        let mut alerts = self.alerts.write();
        match alerts.get_mut(&id) {
            Some(alert) => {
                alert.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self) -> Result<u64> {
        let mut alerts = self.alerts.write();
        let mut flipped = 0;
        for alert in alerts.values_mut().filter(|a| !a.is_read) {
            alert.is_read = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn unread_count(&self) -> Result<u64> {
        Ok(self.alerts.read().values().filter(|a| !a.is_read).count() as u64)
    }
}
