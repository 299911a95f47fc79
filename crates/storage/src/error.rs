//! Storage error types

use common::GatewayError;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Stored row could not be mapped back to a domain record
    #[error("Decode error: {0}")]
    Decode(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => GatewayError::NotFound(msg),
            StorageError::Duplicate(msg) => GatewayError::Conflict(msg),
            other => GatewayError::Storage(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StorageError::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Connection(err.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::Duplicate(db.message().to_string())
            }
            _ => StorageError::Query(err.to_string()),
        }
    }
}
