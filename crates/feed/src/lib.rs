//! Price feed core of Stockgate
//!
//! Ingests observations pushed by the analytics process, persists them,
//! raises alerts for anomalous ones and fans both out to WebSocket
//! subscribers. Also serves the read-only HTTP query surface.
//!
//! ```ignore
//! let feed = Feed::new(&Stores::in_memory(), QueryLimits::default(), FeedMetrics::new());
//! let server = CombinedServer::new("stockgate", config, feed.router(), feed.ws_handler());
//! ```

pub mod api;
pub mod broadcast;
pub mod directory;
pub mod dto;
pub mod pipeline;
pub mod query;
pub mod ws;

use axum::Router;
use observability::FeedMetrics;
use server::MessageHandler;
use std::sync::Arc;
use storage::Stores;

pub use api::{create_router, ApiError, ApiState};
pub use broadcast::{
    Broadcaster, Channel, Event, SnapshotSource, SubscriptionHub,
};
pub use directory::SymbolDirectory;
pub use dto::{AlertDto, PriceDto, SymbolDto};
pub use pipeline::{BatchFailure, BatchOutcome, IngestPipeline, PriceInput};
pub use query::{AlertQueries, PriceQueries, QueryLimits};
pub use ws::SubscriptionHandler;

/// Every feed component wired against one set of stores
pub struct Feed {
    hub: Arc<SubscriptionHub>,
    prices: Arc<PriceQueries>,
    api: Arc<ApiState>,
}

impl Feed {
    pub fn new(stores: &Stores, limits: QueryLimits, metrics: FeedMetrics) -> Self {
        let directory = SymbolDirectory::new(stores.symbols.clone());
        let hub = Arc::new(SubscriptionHub::new(metrics.clone()));
        let prices = PriceQueries::new(directory.clone(), stores.prices.clone(), limits);

        let api = ApiState {
            pipeline: IngestPipeline::new(
                directory.clone(),
                stores.prices.clone(),
                stores.alerts.clone(),
                hub.clone(),
                metrics,
            ),
            prices: prices.clone(),
            alerts: AlertQueries::new(directory.clone(), stores.alerts.clone(), limits),
            directory,
        };

        Self {
            hub,
            prices: Arc::new(prices),
            api: Arc::new(api),
        }
    }

    pub fn directory(&self) -> &SymbolDirectory {
        &self.api.directory
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.api.pipeline
    }

    pub fn hub(&self) -> &Arc<SubscriptionHub> {
        &self.hub
    }

    /// HTTP routes of the gateway API
    pub fn router(&self) -> Router {
        create_router(self.api.clone())
    }

    /// Handler for the WebSocket server
    pub fn ws_handler(&self) -> Arc<dyn MessageHandler> {
        Arc::new(SubscriptionHandler::new(self.hub.clone(), self.prices.clone()))
    }
}
