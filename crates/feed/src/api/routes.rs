//! API routes for the gateway

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::*;
use crate::api::ApiState;

/// Create the gateway router
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        // ingest from the analytics process
        .route("/api/analytics/price", post(ingest_price))
        .route("/api/analytics/prices/batch", post(ingest_batch))
        .route("/api/analytics/health", get(analytics_health))
        // prices
        .route("/api/prices", get(latest_prices))
        .route("/api/prices/:ticker", get(latest_price))
        .route("/api/prices/:ticker/history", get(price_history))
        .route("/api/prices/:ticker/variations", get(price_variations))
        // symbols
        .route("/api/symbols", get(list_symbols).post(create_symbol))
        .route("/api/symbols/:ticker", get(get_symbol))
        // alerts
        .route("/api/alerts", get(recent_alerts))
        .route("/api/alerts/unread", get(unread_alerts))
        .route("/api/alerts/unread/count", get(unread_count))
        .route("/api/alerts/read-all", put(mark_all_read))
        .route("/api/alerts/symbol/:ticker", get(alerts_by_symbol))
        .route("/api/alerts/type/:alert_type", get(alerts_by_type))
        .route("/api/alerts/:id/read", put(mark_read))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
