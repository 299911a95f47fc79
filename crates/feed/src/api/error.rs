//! HTTP mapping of gateway errors

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::GatewayError;
use tracing::error;

use crate::api::models::{ErrorDetail, ErrorResponse};

/// A [`GatewayError`] rendered as `{"success":false,"error":{"code","message"}}`
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Storage(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

/// Unreadable or mistyped JSON bodies are bad input, not 422s
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(GatewayError::invalid_input(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }

        let body = ErrorResponse {
            success: false,
            error: ErrorDetail::from(&self.0),
        };
        (status, Json(body)).into_response()
    }
}
