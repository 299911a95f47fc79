//! Logging and Prometheus metrics shared by the gateway crates
//!
//! Metric handles work before [`init_metrics`] runs, they just record into
//! nothing, so library code and tests never have to check for an exporter.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, FeedMetrics, IngestTimer, ServerMetrics};
