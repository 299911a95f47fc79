//! Ingestion pipeline
//!
//! validate -> resolve symbol -> persist -> publish price -> (anomaly) persist
//! alert -> publish alert.
//!
//! Publishing happens after persistence and never undoes it. A failure while
//! creating the alert is returned to the caller, but the observation stays
//! stored.

use chrono::{DateTime, Utc};
use common::{AlertType, GatewayError, NewAlert, NewPriceObservation, Result, Symbol};
use observability::FeedMetrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use storage::{AlertStore, PriceStore};
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::directory::SymbolDirectory;
use crate::dto::{AlertDto, PriceDto};

/// One observation as pushed by the analytics process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceInput {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub moving_average_5: Option<Decimal>,
    #[serde(default)]
    pub moving_average_20: Option<Decimal>,
    #[serde(default)]
    pub percent_change: Option<Decimal>,
    /// Observation time; defaults to the receipt time
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_anomaly: bool,
    #[serde(default)]
    pub anomaly_type: Option<String>,
    #[serde(default)]
    pub anomaly_message: Option<String>,
}

impl PriceInput {
    pub fn new(ticker: impl Into<String>, price: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            price: Some(price),
            ..Default::default()
        }
    }

    pub fn with_percent_change(mut self, percent_change: Decimal) -> Self {
        self.percent_change = Some(percent_change);
        self
    }

    /// Flag as anomalous with an optional type hint
    pub fn anomalous(mut self, anomaly_type: Option<&str>) -> Self {
        self.is_anomaly = true;
        self.anomaly_type = anomaly_type.map(str::to_string);
        self
    }

    fn validated_price(&self) -> Result<Decimal> {
        if self.ticker.trim().is_empty() {
            return Err(GatewayError::invalid_input("Ticker must not be empty"));
        }
        let price = self
            .price
            .ok_or_else(|| GatewayError::invalid_input("Price is required"))?;
        if price <= Decimal::ZERO {
            return Err(GatewayError::invalid_input(format!(
                "Price must be positive, got {}",
                price
            )));
        }
        if let Some(volume) = self.volume {
            if volume < Decimal::ZERO {
                return Err(GatewayError::invalid_input(format!(
                    "Volume must not be negative, got {}",
                    volume
                )));
            }
        }
        Ok(price)
    }
}

/// Map the analytics anomaly hint onto an alert type
///
/// Only the spike and volume hints are recognised; anything else is a generic
/// anomaly. Threshold breaches are never derived from a hint.
pub fn alert_type_for_hint(hint: Option<&str>) -> AlertType {
    match hint.and_then(AlertType::parse) {
        Some(t @ (AlertType::SpikeUp | AlertType::SpikeDown | AlertType::VolumeSurge)) => t,
        _ => AlertType::Anomaly,
    }
}

/// Message used when the analytics process did not provide one
pub fn default_alert_message(alert_type: AlertType, ticker: &str) -> String {
    format!("{} detected for {}", alert_type, ticker)
}

/// Failure of one batch element
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    /// Position in the submitted batch
    pub index: usize,
    pub ticker: String,
    pub error: GatewayError,
}

/// Result of a batch ingest; successes and failures are both in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub saved: Vec<PriceDto>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A batch element after decoding: the input, or the ticker it claimed and why
/// it was unreadable
type DecodedEntry = std::result::Result<PriceInput, (String, GatewayError)>;

/// Persists incoming observations, raises alerts and fans both out
#[derive(Clone)]
pub struct IngestPipeline {
    directory: SymbolDirectory,
    prices: Arc<dyn PriceStore>,
    alerts: Arc<dyn AlertStore>,
    broadcaster: Arc<dyn Broadcaster>,
    metrics: FeedMetrics,
}

impl IngestPipeline {
    pub fn new(
        directory: SymbolDirectory,
        prices: Arc<dyn PriceStore>,
        alerts: Arc<dyn AlertStore>,
        broadcaster: Arc<dyn Broadcaster>,
        metrics: FeedMetrics,
    ) -> Self {
        Self {
            directory,
            prices,
            alerts,
            broadcaster,
            metrics,
        }
    }

    /// Ingest one observation and return it as persisted
    pub async fn ingest_one(&self, input: PriceInput) -> Result<PriceDto> {
        let _timer = self.metrics.start_ingest();

        let price = input.validated_price()?;
        let symbol = self.directory.resolve(&input.ticker).await?;

        let observation = NewPriceObservation::new(symbol.id, price, input.timestamp)
            .with_volume(input.volume)
            .with_moving_averages(input.moving_average_5, input.moving_average_20)
            .with_percent_change(input.percent_change);
        let observation = self.prices.append(observation).await?;
        self.metrics.price_saved();

        let dto = PriceDto::new(observation, &symbol);
        debug!(ticker = %dto.ticker, price = %dto.price, id = dto.id, "Price saved");
        self.broadcaster.publish_price(&dto);

        if input.is_anomaly {
            self.raise_alert(&symbol, &input, &dto).await?;
        }

        Ok(dto)
    }

    /// Ingest each element independently, in input order
    ///
    /// A failing element does not stop the batch or undo earlier elements.
    pub async fn ingest_batch(&self, inputs: Vec<PriceInput>) -> BatchOutcome {
        self.ingest_entries(inputs.into_iter().map(Ok).collect()).await
    }

    /// Like [`ingest_batch`](Self::ingest_batch) for raw JSON elements; an
    /// element that does not decode fails alone as `InvalidInput`
    pub async fn ingest_json_batch(&self, elements: Vec<Value>) -> BatchOutcome {
        let entries = elements
            .into_iter()
            .map(|element| {
                let ticker = element
                    .get("ticker")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                serde_json::from_value::<PriceInput>(element).map_err(|e| {
                    (ticker, GatewayError::invalid_input(format!("Malformed observation: {}", e)))
                })
            })
            .collect();
        self.ingest_entries(entries).await
    }

    async fn ingest_entries(&self, entries: Vec<DecodedEntry>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (index, entry) in entries.into_iter().enumerate() {
            let (ticker, result) = match entry {
                Ok(input) => (input.ticker.clone(), self.ingest_one(input).await),
                Err((ticker, error)) => (ticker, Err(error)),
            };
            match result {
                Ok(dto) => outcome.saved.push(dto),
                Err(error) => {
                    warn!(index, %ticker, %error, "Batch element rejected");
                    outcome.failures.push(BatchFailure {
                        index,
                        ticker,
                        error,
                    });
                }
            }
        }

        debug!(
            saved = outcome.saved.len(),
            failed = outcome.failures.len(),
            "Batch ingested"
        );
        outcome
    }

    async fn raise_alert(&self, symbol: &Symbol, input: &PriceInput, price: &PriceDto) -> Result<()> {
        let alert_type = alert_type_for_hint(input.anomaly_type.as_deref());
        let message = input
            .anomaly_message
            .clone()
            .unwrap_or_else(|| default_alert_message(alert_type, &symbol.ticker));

        let alert = NewAlert::new(
            symbol.id,
            alert_type,
            message,
            Some(price.price),
            price.percent_change,
        );
        let alert = self.alerts.append(alert).await?;
        self.metrics.alert_created(alert_type.as_str());

        let dto = AlertDto::new(alert, symbol);
        info!(ticker = %dto.ticker, alert_type = %dto.alert_type, message = %dto.message, "Alert created");
        self.broadcaster.publish_alert(&dto);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{Channel, Event, RecordingBroadcaster};
    use assert_matches::assert_matches;
    use common::AssetType;
    use storage::{Stores, SymbolStore};

    struct Fixture {
        stores: Stores,
        recorder: Arc<RecordingBroadcaster>,
        pipeline: IngestPipeline,
    }

    async fn fixture() -> Fixture {
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

        let recorder = Arc::new(RecordingBroadcaster::new());
        let pipeline = IngestPipeline::new(
            directory,
            stores.prices.clone(),
            stores.alerts.clone(),
            recorder.clone(),
            FeedMetrics::new(),
        );
        Fixture {
            stores,
            recorder,
            pipeline,
        }
    }

    #[test]
    fn test_alert_type_mapping() {
        assert_eq!(alert_type_for_hint(Some("SPIKE_UP")), AlertType::SpikeUp);
        assert_eq!(alert_type_for_hint(Some("spike_down")), AlertType::SpikeDown);
        assert_eq!(alert_type_for_hint(Some("Volume_Surge")), AlertType::VolumeSurge);
        assert_eq!(alert_type_for_hint(Some("THRESHOLD_BREACH")), AlertType::Anomaly);
        assert_eq!(alert_type_for_hint(Some("weird")), AlertType::Anomaly);
        assert_eq!(alert_type_for_hint(None), AlertType::Anomaly);
    }

    #[tokio::test]
    async fn test_ingest_becomes_latest() {
        let f = fixture().await;
        let saved = f
            .pipeline
            .ingest_one(PriceInput::new("btc", Decimal::new(45000, 0)))
            .await
            .unwrap();
        assert_eq!(saved.ticker, "BTC");

        let symbol = f.stores.symbols.find_by_ticker("BTC").await.unwrap().unwrap();
        let latest = f.stores.prices.latest(symbol.id).await.unwrap().unwrap();
        assert_eq!(latest.id, saved.id);
        assert_eq!(latest.price, Decimal::new(45000, 0));
        assert_eq!(f.stores.alerts.unread_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_btc_spike_publishes_on_three_channels() {
        let f = fixture().await;
        let input = PriceInput::new("BTC", Decimal::new(45000, 0))
            .with_percent_change(Decimal::new(55, 1))
            .anomalous(Some("SPIKE_UP"));

        f.pipeline.ingest_one(input).await.unwrap();

        let all = f.recorder.on_channel(&Channel::AllPrices);
        let btc = f.recorder.on_channel(&Channel::prices("BTC"));
        let alerts = f.recorder.on_channel(&Channel::AllAlerts);
        assert_eq!(all.len(), 1);
        assert_eq!(btc.len(), 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(f.recorder.events().len(), 3);

        assert_matches!(&alerts[0], Event::Alert(alert) => {
            assert_eq!(alert.alert_type, AlertType::SpikeUp);
            assert_eq!(alert.trigger_value, Some(Decimal::new(45000, 0)));
            assert_eq!(alert.threshold_value, Some(Decimal::new(55, 1)));
            assert_eq!(alert.message, "SPIKE_UP detected for BTC");
            assert!(!alert.is_read);
        });

        let stored = f.stores.alerts.unread().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].alert_type, AlertType::SpikeUp);
    }

    #[tokio::test]
    async fn test_unrecognised_hint_is_generic_anomaly() {
        let f = fixture().await;
        let mut input = PriceInput::new("AAPL", Decimal::new(190, 0)).anomalous(None);
        input.anomaly_message = Some("Unusual move".to_string());

        f.pipeline.ingest_one(input).await.unwrap();

        let stored = f.stores.alerts.unread().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].alert_type, AlertType::Anomaly);
        assert_eq!(stored[0].message, "Unusual move");
        assert_eq!(stored[0].threshold_value, None);
    }

    #[tokio::test]
    async fn test_unknown_ticker_persists_nothing() {
        let f = fixture().await;
        let input = PriceInput::new("DOGE", Decimal::new(1, 1)).anomalous(Some("SPIKE_UP"));

        let result = f.pipeline.ingest_one(input).await;
        assert_matches!(result, Err(GatewayError::NotFound(_)));

        assert!(f.stores.prices.latest_all().await.unwrap().is_empty());
        assert_eq!(f.stores.alerts.unread_count().await.unwrap(), 0);
        assert!(f.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let f = fixture().await;

        let zero = PriceInput::new("BTC", Decimal::ZERO);
        assert_matches!(f.pipeline.ingest_one(zero).await, Err(GatewayError::InvalidInput(_)));

        let missing = PriceInput {
            ticker: "BTC".to_string(),
            ..Default::default()
        };
        assert_matches!(
            f.pipeline.ingest_one(missing).await,
            Err(GatewayError::InvalidInput(_))
        );

        let mut negative_volume = PriceInput::new("BTC", Decimal::ONE);
        negative_volume.volume = Some(Decimal::NEGATIVE_ONE);
        assert_matches!(
            f.pipeline.ingest_one(negative_volume).await,
            Err(GatewayError::InvalidInput(_))
        );

        let blank = PriceInput::new(" ", Decimal::ONE);
        assert_matches!(f.pipeline.ingest_one(blank).await, Err(GatewayError::InvalidInput(_)));

        assert!(f.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_batch_elements_are_independent() {
        let f = fixture().await;
        let outcome = f
            .pipeline
            .ingest_batch(vec![
                PriceInput::new("BTC", Decimal::new(45000, 0)),
                PriceInput::new("DOGE", Decimal::new(1, 1)),
                PriceInput::new("AAPL", Decimal::new(190, 0)),
            ])
            .await;

        assert!(!outcome.is_complete());
        assert_eq!(outcome.saved.len(), 2);
        assert_eq!(outcome.saved[0].ticker, "BTC");
        assert_eq!(outcome.saved[1].ticker, "AAPL");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 1);
        assert_eq!(outcome.failures[0].ticker, "DOGE");
        assert_matches!(outcome.failures[0].error, GatewayError::NotFound(_));

        assert_eq!(f.stores.prices.latest_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_batch_element_fails_alone() {
        let f = fixture().await;
        let outcome = f
            .pipeline
            .ingest_json_batch(vec![
                serde_json::json!({"ticker": "BTC", "price": 1}),
                serde_json::json!({"ticker": "AAPL", "price": 2, "timestamp": "yesterday"}),
                serde_json::json!("not an object"),
            ])
            .await;

        assert_eq!(outcome.saved.len(), 1);
        assert_eq!(outcome.saved[0].ticker, "BTC");
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].index, 1);
        assert_eq!(outcome.failures[0].ticker, "AAPL");
        assert_matches!(outcome.failures[0].error, GatewayError::InvalidInput(_));
        assert_eq!(outcome.failures[1].index, 2);
        assert_eq!(outcome.failures[1].ticker, "");

        assert_eq!(f.stores.prices.latest_all().await.unwrap().len(), 1);
    }
}
