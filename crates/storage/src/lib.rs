//! Storage for Stockgate
//!
//! Provides the symbol directory, price time series and alert log behind
//! async traits, with an in-memory back end and a PostgreSQL back end
//! (feature `postgres`).

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;

pub use error::StorageError;
pub use memory::{InMemoryAlertStore, InMemoryPriceStore, InMemorySymbolStore};
pub use traits::{AlertStore, PriceStore, SymbolStore};

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// The three stores a gateway runs against
#[derive(Clone)]
pub struct Stores {
    pub symbols: Arc<dyn SymbolStore>,
    pub prices: Arc<dyn PriceStore>,
    pub alerts: Arc<dyn AlertStore>,
}

impl Stores {
    /// Fresh, empty in-memory stores
    pub fn in_memory() -> Self {
        Self {
            symbols: Arc::new(InMemorySymbolStore::new()),
            prices: Arc::new(InMemoryPriceStore::new()),
            alerts: Arc::new(InMemoryAlertStore::new()),
        }
    }

    /// All three stores backed by one PostgreSQL pool
    #[cfg(feature = "postgres")]
    pub fn postgres(store: PostgresStore) -> Self {
        let store = Arc::new(store);
        Self {
            symbols: store.clone(),
            prices: store.clone(),
            alerts: store,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
