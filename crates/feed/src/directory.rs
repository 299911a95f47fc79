//! Symbol directory: ticker resolution and registration

use std::sync::Arc;

use common::{
    normalize_ticker, AssetType, GatewayError, NewSymbol, Result, Symbol, SymbolId,
    MAX_SYMBOL_NAME_LEN, MAX_TICKER_LEN,
};
use storage::SymbolStore;
use tracing::{debug, info};

/// Maps tickers to registered symbols
#[derive(Clone)]
pub struct SymbolDirectory {
    store: Arc<dyn SymbolStore>,
}

impl SymbolDirectory {
    pub fn new(store: Arc<dyn SymbolStore>) -> Self {
        Self { store }
    }

    /// Look up a ticker case-insensitively
    pub async fn resolve(&self, ticker: &str) -> Result<Symbol> {
        let ticker = normalize_ticker(ticker);
        self.store
            .find_by_ticker(&ticker)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("Symbol not found: {}", ticker)))
    }

    pub async fn get(&self, id: SymbolId) -> Result<Symbol> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("Symbol not found: id {}", id)))
    }

    /// Register a new symbol; `Conflict` if the ticker is already taken
    pub async fn register(&self, ticker: &str, name: &str, asset_type: AssetType) -> Result<Symbol> {
        let symbol = NewSymbol::new(ticker, name, asset_type);
        validate_new_symbol(&symbol)?;

        let symbol = self.store.insert(symbol).await?;
        info!(ticker = %symbol.ticker, id = symbol.id, "Symbol registered");
        Ok(symbol)
    }

    /// All symbols in ascending id order
    pub async fn list(&self) -> Result<Vec<Symbol>> {
        Ok(self.store.list().await?)
    }

    /// Register each entry that is not present yet, returning how many were added
    pub async fn seed<'a, I>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str, AssetType)>,
    {
        let mut added = 0;
        for (ticker, name, asset_type) in entries {
            match self.register(ticker, name, asset_type).await {
                Ok(_) => added += 1,
                Err(GatewayError::Conflict(_)) => {
                    debug!(ticker, "Seed symbol already registered");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }
}

fn validate_new_symbol(symbol: &NewSymbol) -> Result<()> {
    if symbol.ticker.is_empty() {
        return Err(GatewayError::invalid_input("Ticker must not be empty"));
    }
    if symbol.ticker.chars().count() > MAX_TICKER_LEN {
        return Err(GatewayError::invalid_input(format!(
            "Ticker must be at most {} characters",
            MAX_TICKER_LEN
        )));
    }
    if symbol.name.is_empty() {
        return Err(GatewayError::invalid_input("Symbol name must not be empty"));
    }
    if symbol.name.chars().count() > MAX_SYMBOL_NAME_LEN {
        return Err(GatewayError::invalid_input(format!(
            "Symbol name must be at most {} characters",
            MAX_SYMBOL_NAME_LEN
        )));
    }
    Ok(())
}
