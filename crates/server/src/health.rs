//! Health endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Health of one dependency (storage back end, subscription hub, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Shared state behind `GET /health`
#[derive(Clone)]
pub struct HealthState {
    pub service_name: String,
    pub start_time: Instant,
    pub components: Arc<tokio::sync::RwLock<Vec<ComponentStatus>>>,
}

impl HealthState {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            start_time: Instant::now(),
            components: Arc::new(tokio::sync::RwLock::new(Vec::new())),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Insert or replace a component entry
    pub async fn set_component(&self, status: ComponentStatus) {
        let mut components = self.components.write().await;
        components.retain(|c| c.name != status.name);
        components.push(status);
    }

    pub async fn components(&self) -> Vec<ComponentStatus> {
        self.components.read().await.clone()
    }

    pub async fn is_healthy(&self) -> bool {
        self.components.read().await.iter().all(|c| c.healthy)
    }
}

/// `GET /health`: 200 when every component is healthy, 503 otherwise
pub async fn health_handler(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<Value>) {
    let components = state.components().await;
    let healthy = components.iter().all(|c| c.healthy);
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if healthy { "UP" } else { "DEGRADED" },
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "components": components,
    });

    (status_code, Json(body))
}

/// Stateless liveness handler
pub async fn simple_health_handler() -> Json<Value> {
    Json(json!({
        "status": "UP",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub fn health_routes(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}
