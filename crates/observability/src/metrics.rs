//! Prometheus metrics
//!
//! The exporter is process-wide and installed once at startup. Metric handles
//! created before installation are no-ops, so the helpers below are safe to use
//! in tests.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub const PRICE_UPDATES_TOTAL: &str = "stockgate_price_updates_total";
pub const ALERTS_TOTAL: &str = "stockgate_alerts_total";
pub const INGEST_DURATION_SECONDS: &str = "stockgate_ingest_duration_seconds";
pub const BROADCAST_DROPPED_TOTAL: &str = "stockgate_broadcast_dropped_total";
pub const SUBSCRIBERS: &str = "stockgate_subscribers";

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP listener exposing `/metrics` on the given port.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Metrics of the ingestion pipeline and the fan-out hub
///
/// * `stockgate_price_updates_total` - persisted observations
/// * `stockgate_alerts_total{type}` - created alerts
/// * `stockgate_ingest_duration_seconds` - time spent per ingest call
/// * `stockgate_broadcast_dropped_total{reason}` - undelivered fan-out messages
/// * `stockgate_subscribers` - live subscriber queues
#[derive(Clone)]
pub struct FeedMetrics {
    price_updates: Counter,
    ingest_duration: Histogram,
    subscribers: Gauge,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self {
            price_updates: counter!(PRICE_UPDATES_TOTAL),
            ingest_duration: histogram!(INGEST_DURATION_SECONDS),
            subscribers: gauge!(SUBSCRIBERS),
        }
    }

    pub fn price_saved(&self) {
        self.price_updates.increment(1);
    }

    pub fn alert_created(&self, alert_type: &'static str) {
        counter!(ALERTS_TOTAL, "type" => alert_type).increment(1);
    }

    pub fn record_ingest(&self, duration: Duration) {
        self.ingest_duration.record(duration.as_secs_f64());
    }

    /// Count a message a subscriber queue did not accept
    pub fn broadcast_dropped(&self, reason: &'static str) {
        counter!(BROADCAST_DROPPED_TOTAL, "reason" => reason).increment(1);
    }

    pub fn set_subscribers(&self, count: usize) {
        self.subscribers.set(count as f64);
    }

    /// Start timing one ingest call
    pub fn start_ingest(&self) -> IngestTimer<'_> {
        IngestTimer {
            metrics: self,
            start: Instant::now(),
        }
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Records the ingest duration histogram when dropped
///
/// ```ignore
/// let _timer = metrics.start_ingest();
/// // ... resolve, persist, publish ...
/// ```
pub struct IngestTimer<'a> {
    metrics: &'a FeedMetrics,
    start: Instant,
}

impl IngestTimer<'_> {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for IngestTimer<'_> {
    fn drop(&mut self) {
        self.metrics.record_ingest(self.start.elapsed());
    }
}

/// Per-server connection metrics
///
/// * `server_connections_total{server}` - accepted connections
/// * `server_active_connections{server}` - currently open connections
#[derive(Clone)]
pub struct ServerMetrics {
    connections_total: Counter,
    active_connections: Gauge,
    server_name: String,
}

impl ServerMetrics {
    /// Create metrics for a named server (e.g. "http", "websocket")
    pub fn new(server_name: &str) -> Self {
        let name = server_name.to_string();
        Self {
            connections_total: counter!("server_connections_total", "server" => name.clone()),
            active_connections: gauge!("server_active_connections", "server" => name.clone()),
            server_name: name,
        }
    }

    pub fn connection_opened(&self) {
        self.connections_total.increment(1);
        self.active_connections.increment(1.0);
    }

    pub fn connection_closed(&self) {
        self.active_connections.decrement(1.0);
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}
