//! API handlers for the gateway HTTP endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use common::GatewayError;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::models::*;
use crate::api::ApiState;
use crate::dto::{AlertDto, PriceDto, SymbolDto};
use crate::pipeline::PriceInput;

type ApiResult<T> = Result<Json<T>, ApiError>;

// === Ingest ===

pub async fn ingest_price(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<PriceInput>, JsonRejection>,
) -> ApiResult<PriceDto> {
    let Json(input) = body?;
    debug!(ticker = %input.ticker, "Received price from analytics");
    Ok(Json(state.pipeline.ingest_one(input).await?))
}

pub async fn ingest_batch(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<Vec<Value>>, JsonRejection>,
) -> ApiResult<BatchResponse> {
    let Json(elements) = body?;
    debug!(count = elements.len(), "Received price batch from analytics");
    Ok(Json(state.pipeline.ingest_json_batch(elements).await.into()))
}

pub async fn analytics_health() -> &'static str {
    "OK"
}

// === Prices ===

pub async fn latest_prices(State(state): State<Arc<ApiState>>) -> ApiResult<Vec<PriceDto>> {
    Ok(Json(state.prices.latest_prices().await?))
}

pub async fn latest_price(
    State(state): State<Arc<ApiState>>,
    Path(ticker): Path<String>,
) -> ApiResult<PriceDto> {
    Ok(Json(state.prices.latest_price(&ticker).await?))
}

pub async fn price_history(
    State(state): State<Arc<ApiState>>,
    Path(ticker): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<PriceDto>> {
    Ok(Json(state.prices.history(&ticker, params.limit).await?))
}

pub async fn price_variations(
    State(state): State<Arc<ApiState>>,
    Path(ticker): Path<String>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Vec<PriceDto>> {
    Ok(Json(state.prices.variations(&ticker, params.hours).await?))
}

// === Symbols ===

pub async fn list_symbols(State(state): State<Arc<ApiState>>) -> ApiResult<Vec<SymbolDto>> {
    let symbols = state.directory.list().await?;
    Ok(Json(symbols.into_iter().map(SymbolDto::from).collect()))
}

pub async fn get_symbol(
    State(state): State<Arc<ApiState>>,
    Path(ticker): Path<String>,
) -> ApiResult<SymbolDto> {
    Ok(Json(state.directory.resolve(&ticker).await?.into()))
}

pub async fn create_symbol(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<CreateSymbolRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SymbolDto>), ApiError> {
    let Json(req) = body?;
    let symbol = state
        .directory
        .register(&req.ticker, &req.name, req.asset_type)
        .await?;
    Ok((StatusCode::CREATED, Json(symbol.into())))
}

// === Alerts ===

pub async fn recent_alerts(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Vec<AlertDto>> {
    Ok(Json(state.alerts.recent(params.hours).await?))
}

pub async fn unread_alerts(State(state): State<Arc<ApiState>>) -> ApiResult<Vec<AlertDto>> {
    Ok(Json(state.alerts.unread().await?))
}

pub async fn unread_count(State(state): State<Arc<ApiState>>) -> ApiResult<CountResponse> {
    let count = state.alerts.unread_count().await?;
    Ok(Json(CountResponse { count }))
}

pub async fn alerts_by_symbol(
    State(state): State<Arc<ApiState>>,
    Path(ticker): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<AlertDto>> {
    Ok(Json(state.alerts.by_symbol(&ticker, params.limit).await?))
}

pub async fn alerts_by_type(
    State(state): State<Arc<ApiState>>,
    Path(alert_type): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<AlertDto>> {
    Ok(Json(state.alerts.by_type(&alert_type, params.limit).await?))
}

pub async fn mark_read(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<MarkReadResponse> {
    let id: i64 = id
        .parse()
        .map_err(|_| GatewayError::invalid_input(format!("Invalid alert id: {}", id)))?;
    let updated = state.alerts.mark_read(id).await?;
    Ok(Json(MarkReadResponse { id, updated }))
}

pub async fn mark_all_read(State(state): State<Arc<ApiState>>) -> ApiResult<CountResponse> {
    let count = state.alerts.mark_all_read().await?;
    Ok(Json(CountResponse { count }))
}
