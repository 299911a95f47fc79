//! Common types and utilities for Stockgate
//!
//! This crate provides the domain records shared by the storage back ends,
//! the ingestion pipeline and the HTTP/WebSocket surfaces.
//!
//! # Modules
//!
//! - [`error`] - The gateway error taxonomy
//! - [`types`] - Symbols, price observations and alerts

pub mod error;
pub mod types;

pub use error::{GatewayError, Result};
pub use types::*;
