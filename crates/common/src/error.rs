//! Gateway error taxonomy

use thiserror::Error;

/// Error type shared by every Stockgate crate
///
/// `NotFound`, `Conflict` and `InvalidInput` are the caller-facing failures of the
/// ingestion and query paths. `Storage` and `Internal` cover back-end faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Unknown ticker, or no record for a symbol/price/alert identity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate ticker registration
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed observation or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistence back end failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using [`GatewayError`]
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(GatewayError::not_found("x").code(), "NOT_FOUND");
        assert_eq!(GatewayError::conflict("x").code(), "CONFLICT");
        assert_eq!(GatewayError::invalid_input("x").code(), "INVALID_INPUT");
        assert_eq!(GatewayError::storage("x").code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_error_display() {
        let err = GatewayError::not_found("Symbol not found: DOGE");
        assert_eq!(err.to_string(), "Not found: Symbol not found: DOGE");
    }
}
