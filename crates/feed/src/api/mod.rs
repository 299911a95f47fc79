//! HTTP API: analytics ingest plus the read-only query surface

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

pub use error::ApiError;
pub use routes::create_router;

use crate::directory::SymbolDirectory;
use crate::pipeline::IngestPipeline;
use crate::query::{AlertQueries, PriceQueries};

/// Shared state behind every API handler
pub struct ApiState {
    pub directory: SymbolDirectory,
    pub pipeline: IngestPipeline,
    pub prices: PriceQueries,
    pub alerts: AlertQueries,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RecordingBroadcaster;
    use crate::query::QueryLimits;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use common::AssetType;
    use observability::FeedMetrics;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use storage::Stores;
    use tower::ServiceExt;

    async fn app() -> Router {
        let stores = Stores::in_memory();
        let directory = SymbolDirectory::new(stores.symbols.clone());
        directory
            .register("BTC", "Bitcoin", AssetType::Crypto)
            .await
            .unwrap();
        directory
            .register("AAPL", "Apple Inc.", AssetType::Stock)
            .await
            .unwrap();

        let limits = QueryLimits::default();
        let state = ApiState {
            pipeline: IngestPipeline::new(
                directory.clone(),
                stores.prices.clone(),
                stores.alerts.clone(),
                Arc::new(RecordingBroadcaster::new()),
                FeedMetrics::new(),
            ),
            prices: PriceQueries::new(directory.clone(), stores.prices.clone(), limits),
            alerts: AlertQueries::new(directory.clone(), stores.alerts.clone(), limits),
            directory,
        };
        create_router(Arc::new(state))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_ingest_then_query() {
        let app = app().await;
        let (status, saved) = send(
            &app,
            "POST",
            "/api/analytics/price",
            Some(json!({
                "ticker": "btc",
                "price": 45000.5,
                "volume": 12.0,
                "percent_change": 5.5,
                "is_anomaly": true,
                "anomaly_type": "SPIKE_UP"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["ticker"], "BTC");
        assert_eq!(saved["price"], 45000.5);

        let (status, latest) = send(&app, "GET", "/api/prices/BTC", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(latest["id"], saved["id"]);

        let (_, all) = send(&app, "GET", "/api/prices", None).await;
        assert_eq!(all.as_array().unwrap().len(), 1);

        let (_, history) = send(&app, "GET", "/api/prices/btc/history?limit=10", None).await;
        assert_eq!(history.as_array().unwrap().len(), 1);

        let (_, count) = send(&app, "GET", "/api/alerts/unread/count", None).await;
        assert_eq!(count, json!({"count": 1}));

        let (_, alerts) = send(&app, "GET", "/api/alerts/type/spike_up", None).await;
        assert_eq!(alerts[0]["trigger_value"], 45000.5);
        assert_eq!(alerts[0]["threshold_value"], 5.5);
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_404() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/analytics/price",
            Some(json!({"ticker": "DOGE", "price": 0.1, "is_anomaly": true})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (_, count) = send(&app, "GET", "/api/alerts/unread/count", None).await;
        assert_eq!(count["count"], 0);
        let (_, all) = send(&app, "GET", "/api/prices", None).await;
        assert_eq!(all, json!([]));
    }

    #[tokio::test]
    async fn test_invalid_price_is_400() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/analytics/price",
            Some(json!({"ticker": "BTC", "price": -1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_mistyped_price_is_400_envelope() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/analytics/price",
            Some(json!({"ticker": "BTC", "price": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");

        let (status, body) = send(
            &app,
            "POST",
            "/api/symbols",
            Some(json!({"ticker": "SOL", "name": "Solana", "asset_type": "BOND"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");

        let (_, all) = send(&app, "GET", "/api/prices", None).await;
        assert_eq!(all, json!([]));
    }

    #[tokio::test]
    async fn test_batch_keeps_valid_elements_around_undecodable_one() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/analytics/prices/batch",
            Some(json!([
                {"ticker": "BTC", "price": 1},
                {"ticker": "AAPL", "price": 2, "timestamp": "yesterday"}
            ])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved_count"], 1);
        assert_eq!(body["failures"][0]["index"], 1);
        assert_eq!(body["failures"][0]["ticker"], "AAPL");
        assert_eq!(body["failures"][0]["error"]["code"], "INVALID_INPUT");

        let (_, all) = send(&app, "GET", "/api/prices", None).await;
        assert_eq!(all[0]["ticker"], "BTC");

        let (status, body) = send(
            &app,
            "POST",
            "/api/analytics/prices/batch",
            Some(json!({"ticker": "BTC", "price": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_batch_reports_failures_per_element() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/analytics/prices/batch",
            Some(json!([
                {"ticker": "BTC", "price": 45000},
                {"ticker": "DOGE", "price": 0.1},
                {"ticker": "AAPL", "price": 190.25}
            ])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["saved_count"], 2);
        assert_eq!(body["failures"][0]["index"], 1);
        assert_eq!(body["failures"][0]["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_symbol_registration() {
        let app = app().await;
        let (status, created) = send(
            &app,
            "POST",
            "/api/symbols",
            Some(json!({"ticker": "eth", "name": "Ethereum", "asset_type": "CRYPTO"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["ticker"], "ETH");

        let (status, body) = send(
            &app,
            "POST",
            "/api/symbols",
            Some(json!({"ticker": "ETH", "name": "Again", "asset_type": "CRYPTO"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (_, symbols) = send(&app, "GET", "/api/symbols", None).await;
        assert_eq!(symbols.as_array().unwrap().len(), 3);

        let (status, _) = send(&app, "GET", "/api/symbols/doge", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mark_read_flow() {
        let app = app().await;
        for _ in 0..2 {
            send(
                &app,
                "POST",
                "/api/analytics/price",
                Some(json!({"ticker": "AAPL", "price": 190, "is_anomaly": true})),
            )
            .await;
        }

        let (_, unread) = send(&app, "GET", "/api/alerts/unread", None).await;
        let id = unread[0]["id"].as_i64().unwrap();
        assert_eq!(unread[0]["alert_type"], "ANOMALY");
        assert_eq!(unread[0]["message"], "ANOMALY detected for AAPL");

        let uri = format!("/api/alerts/{}/read", id);
        let (status, body) = send(&app, "PUT", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], true);
        let (_, body) = send(&app, "PUT", &uri, None).await;
        assert_eq!(body["updated"], true);

        let (_, body) = send(&app, "PUT", "/api/alerts/4242/read", None).await;
        assert_eq!(body["updated"], false);
        let (status, _) = send(&app, "PUT", "/api/alerts/abc/read", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, "PUT", "/api/alerts/read-all", None).await;
        assert_eq!(body["count"], 1);
        let (_, count) = send(&app, "GET", "/api/alerts/unread/count", None).await;
        assert_eq!(count["count"], 0);

        let (_, recent) = send(&app, "GET", "/api/alerts?hours=1", None).await;
        assert_eq!(recent.as_array().unwrap().len(), 2);
        let (_, by_symbol) = send(&app, "GET", "/api/alerts/symbol/aapl?limit=1", None).await;
        assert_eq!(by_symbol.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_analytics_health() {
        let app = app().await;
        let response = app
            .oneshot(
                Request::get("/api/analytics/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }
}
