//! Request and response bodies of the HTTP API

use common::{AssetType, GatewayError};
use serde::{Deserialize, Serialize};

use crate::dto::PriceDto;
use crate::pipeline::{BatchFailure, BatchOutcome};

/// Request to register a symbol
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSymbolRequest {
    pub ticker: String,
    pub name: String,
    pub asset_type: AssetType,
}

/// `?limit=` query parameter
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LimitParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `?hours=` query parameter
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WindowParams {
    #[serde(default)]
    pub hours: Option<i64>,
}

/// Outcome of a batch ingest
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    /// True when every element was saved
    pub success: bool,
    pub saved_count: usize,
    pub failed_count: usize,
    pub saved: Vec<PriceDto>,
    pub failures: Vec<BatchFailureResponse>,
}

impl From<BatchOutcome> for BatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            success: outcome.is_complete(),
            saved_count: outcome.saved.len(),
            failed_count: outcome.failures.len(),
            saved: outcome.saved,
            failures: outcome.failures.into_iter().map(Into::into).collect(),
        }
    }
}

/// One rejected batch element
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchFailureResponse {
    pub index: usize,
    pub ticker: String,
    pub error: ErrorDetail,
}

impl From<BatchFailure> for BatchFailureResponse {
    fn from(failure: BatchFailure) -> Self {
        Self {
            index: failure.index,
            ticker: failure.ticker,
            error: ErrorDetail::from(&failure.error),
        }
    }
}

/// `{"count": n}`
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Result of marking one alert read
#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub id: i64,
    /// False when no alert has this id
    pub updated: bool,
}

/// Error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl From<&GatewayError> for ErrorDetail {
    fn from(err: &GatewayError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Generic error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}
