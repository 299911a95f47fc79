//! WebSocket subscription protocol
//!
//! Clients send `{"action":"subscribe"|"unsubscribe","channel":"..."}` text
//! frames. Each request gets one direct reply; snapshots and live events
//! arrive through the connection's outbound queue after it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use server::websocket::Message;
use server::{ConnectionId, MessageHandler, Outbound};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::broadcast::{Channel, Event, SnapshotSource, SubscriptionHub};

#[derive(Debug, Deserialize)]
struct ClientRequest {
    action: String,
    channel: String,
}

/// Direct reply to a client request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reply {
    Subscribed { channel: String },
    Unsubscribed { channel: String },
    Error { message: String },
}

impl Reply {
    fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }

    fn into_message(self) -> Option<Message> {
        match serde_json::to_string(&self) {
            Ok(text) => Some(Message::Text(text)),
            Err(e) => {
                warn!(%e, "Failed to encode reply");
                None
            }
        }
    }
}

/// Bridges WebSocket connections to the [`SubscriptionHub`]
pub struct SubscriptionHandler {
    hub: Arc<SubscriptionHub>,
    snapshots: Arc<dyn SnapshotSource>,
}

impl SubscriptionHandler {
    pub fn new(hub: Arc<SubscriptionHub>, snapshots: Arc<dyn SnapshotSource>) -> Self {
        Self { hub, snapshots }
    }

    async fn respond(&self, conn_id: ConnectionId, text: &str) -> Reply {
        let request: ClientRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => return Reply::error(format!("Invalid request: {}", e)),
        };

        let Some(channel) = Channel::parse(&request.channel) else {
            return Reply::error(format!("Unknown channel: {}", request.channel));
        };

        match request.action.trim().to_lowercase().as_str() {
            "subscribe" => self.subscribe(conn_id, channel).await,
            "unsubscribe" => {
                self.hub.unsubscribe(conn_id, &channel);
                debug!(conn_id, %channel, "Unsubscribed");
                Reply::Unsubscribed {
                    channel: channel.to_string(),
                }
            }
            other => Reply::error(format!("Unknown action: {}", other)),
        }
    }

    /// Registers interest before reading the snapshot, so an update persisted
    /// meanwhile is either in the snapshot or queued as a live frame (possibly
    /// both), never neither.
    async fn subscribe(&self, conn_id: ConnectionId, channel: Channel) -> Reply {
        if !self.hub.subscribe(conn_id, channel.clone()) {
            return Reply::error("Connection is not registered");
        }

        let snapshot = match &channel {
            Channel::AllPrices => match self.snapshots.latest_all().await {
                Ok(prices) => Some(Event::Snapshot(prices)),
                Err(e) => {
                    warn!(conn_id, %e, "Snapshot unavailable");
                    None
                }
            },
            // an unknown ticker never publishes, so nothing leaks before the rollback
            Channel::Prices(ticker) => match self.snapshots.latest_for(ticker).await {
                Ok(latest) => latest.map(Event::TickerSnapshot),
                Err(e) => {
                    self.hub.unsubscribe(conn_id, &channel);
                    return Reply::error(e.to_string());
                }
            },
            Channel::AllAlerts => None,
        };
        info!(conn_id, %channel, "Subscribed");

        if let Some(event) = snapshot {
            self.hub.send_to(conn_id, &channel, &event);
        }

        Reply::Subscribed {
            channel: channel.to_string(),
        }
    }
}

#[async_trait]
impl MessageHandler for SubscriptionHandler {
    async fn handle(&self, conn_id: ConnectionId, message: Message) -> Option<Message> {
        match message {
            Message::Text(text) => self.respond(conn_id, &text).await.into_message(),
            Message::Binary(_) => Reply::error("Binary frames are not supported").into_message(),
            _ => None,
        }
    }

    fn on_connect(&self, conn_id: ConnectionId, peer_addr: SocketAddr, outbound: Outbound) {
        debug!(conn_id, %peer_addr, "Subscriber connected");
        self.hub.register(conn_id, outbound);
    }

    fn on_disconnect(&self, conn_id: ConnectionId) {
        self.hub.unregister(conn_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::directory::SymbolDirectory;
    use crate::pipeline::{IngestPipeline, PriceInput};
    use crate::query::{PriceQueries, QueryLimits};
    use common::AssetType;
    use observability::FeedMetrics;
    use rust_decimal::Decimal;
    use storage::Stores;
    use tokio::sync::mpsc;

    struct Fixture {
        hub: Arc<SubscriptionHub>,
        handler: SubscriptionHandler,
        pipeline: IngestPipeline,
        queries: PriceQueries,
    }

    async fn fixture() -> Fixture {
        let stores = Stores::in_memory();
        let directory = SymbolDirectory::new(stores.symbols.clone());
        directory
            .register("BTC", "Bitcoin", AssetType::Crypto)
            .await
            .unwrap();
        directory
            .register("ETH", "Ethereum", AssetType::Crypto)
            .await
            .unwrap();

        let metrics = FeedMetrics::new();
        let hub = Arc::new(SubscriptionHub::new(metrics.clone()));
        let queries = PriceQueries::new(
            directory.clone(),
            stores.prices.clone(),
            QueryLimits::default(),
        );
        let handler = SubscriptionHandler::new(hub.clone(), Arc::new(queries.clone()));
        let pipeline = IngestPipeline::new(
            directory,
            stores.prices.clone(),
            stores.alerts.clone(),
            hub.clone(),
            metrics,
        );
        Fixture {
            hub,
            handler,
            pipeline,
            queries,
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn request(handler: &SubscriptionHandler, conn_id: ConnectionId, body: &str) -> Reply {
        let reply = handler
            .handle(conn_id, Message::Text(body.to_string()))
            .await
            .expect("reply");
        match reply {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    fn next_push(rx: &mut mpsc::Receiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.try_recv().expect("queued push")).unwrap()
    }

    #[tokio::test]
    async fn test_prices_all_subscription_gets_snapshot() {
        let f = fixture().await;
        f.pipeline
            .ingest_one(PriceInput::new("ETH", Decimal::new(3000, 0)))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        f.handler.on_connect(1, peer(), tx);

        let reply = request(&f.handler, 1, r#"{"action":"subscribe","channel":"prices:all"}"#).await;
        assert_eq!(
            reply,
            Reply::Subscribed {
                channel: "prices:all".to_string()
            }
        );

        let snapshot = next_push(&mut rx);
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["data"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot["data"][0]["ticker"], "ETH");
    }

    #[tokio::test]
    async fn test_end_to_end_btc_spike() {
        let f = fixture().await;

        let (all_tx, mut all_rx) = mpsc::channel(16);
        let (btc_tx, mut btc_rx) = mpsc::channel(16);
        let (alert_tx, mut alert_rx) = mpsc::channel(16);
        f.handler.on_connect(1, peer(), all_tx);
        f.handler.on_connect(2, peer(), btc_tx);
        f.handler.on_connect(3, peer(), alert_tx);

        request(&f.handler, 1, r#"{"action":"subscribe","channel":"prices:all"}"#).await;
        request(&f.handler, 2, r#"{"action":"subscribe","channel":"prices:btc"}"#).await;
        request(&f.handler, 3, r#"{"action":"subscribe","channel":"alerts:all"}"#).await;

        // empty snapshot for prices:all; no snapshot for a ticker without data
        assert_eq!(next_push(&mut all_rx)["type"], "snapshot");

        let mut input = PriceInput::new("btc", Decimal::new(45000, 0))
            .with_percent_change(Decimal::new(55, 1))
            .anomalous(Some("SPIKE_UP"));
        input.anomaly_message = Some("sudden spike".to_string());
        f.pipeline.ingest_one(input).await.unwrap();

        let price = next_push(&mut all_rx);
        assert_eq!(price["type"], "price");
        assert_eq!(price["channel"], "prices:all");
        assert_eq!(price["data"]["ticker"], "BTC");
        assert!(all_rx.try_recv().is_err());

        let ticker_price = next_push(&mut btc_rx);
        assert_eq!(ticker_price["type"], "price");
        assert_eq!(ticker_price["channel"], "prices:BTC");
        assert!(btc_rx.try_recv().is_err());

        let alert = next_push(&mut alert_rx);
        assert_eq!(alert["type"], "alert");
        assert_eq!(alert["channel"], "alerts:all");
        assert_eq!(alert["data"]["alert_type"], "SPIKE_UP");
        assert_eq!(alert["data"]["ticker"], "BTC");
        assert_eq!(alert["data"]["message"], "sudden spike");
        assert_eq!(alert["data"]["trigger_value"], 45000.0);
        assert_eq!(alert["data"]["threshold_value"], 5.5);
        assert!(alert_rx.try_recv().is_err());
    }

    /// Reads the snapshot, then lets an ingest land before returning it
    struct IngestDuringSnapshot {
        queries: PriceQueries,
        pipeline: IngestPipeline,
    }

    #[async_trait]
    impl SnapshotSource for IngestDuringSnapshot {
        async fn latest_all(&self) -> common::Result<Vec<crate::dto::PriceDto>> {
            let stale = self.queries.latest_all().await?;
            self.pipeline
                .ingest_one(PriceInput::new("BTC", Decimal::new(50000, 0)))
                .await?;
            Ok(stale)
        }

        async fn latest_for(&self, ticker: &str) -> common::Result<Option<crate::dto::PriceDto>> {
            self.queries.latest_for(ticker).await
        }
    }

    #[tokio::test]
    async fn test_price_saved_while_subscribing_still_arrives() {
        let f = fixture().await;
        let racing = IngestDuringSnapshot {
            queries: f.queries.clone(),
            pipeline: f.pipeline.clone(),
        };
        let handler = SubscriptionHandler::new(f.hub.clone(), Arc::new(racing));

        let (tx, mut rx) = mpsc::channel(16);
        handler.on_connect(1, peer(), tx);
        request(&handler, 1, r#"{"action":"subscribe","channel":"prices:all"}"#).await;

        let mut frames = Vec::new();
        while let Ok(text) = rx.try_recv() {
            frames.push(serde_json::from_str::<serde_json::Value>(&text).unwrap());
        }
        let live = frames
            .iter()
            .find(|frame| frame["type"] == "price")
            .expect("live price frame");
        assert_eq!(live["data"]["ticker"], "BTC");
        assert_eq!(live["data"]["price"], 50000.0);
        assert!(frames.iter().any(|frame| frame["type"] == "snapshot"));
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_rejected() {
        let f = fixture().await;
        let (tx, mut rx) = mpsc::channel(16);
        f.handler.on_connect(1, peer(), tx);

        let reply = request(&f.handler, 1, r#"{"action":"subscribe","channel":"prices:DOGE"}"#).await;
        assert!(matches!(reply, Reply::Error { .. }));
        assert!(!f.hub.is_subscribed(1, &Channel::prices("DOGE")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ticker_subscription_gets_latest() {
        let f = fixture().await;
        f.pipeline
            .ingest_one(PriceInput::new("BTC", Decimal::new(44000, 0)))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        f.handler.on_connect(1, peer(), tx);
        request(&f.handler, 1, r#"{"action":"subscribe","channel":"prices:BTC"}"#).await;

        let snapshot = next_push(&mut rx);
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["channel"], "prices:BTC");
        assert_eq!(snapshot["data"]["price"], 44000.0);
    }

    #[tokio::test]
    async fn test_unsubscribe_and_bad_requests() {
        let f = fixture().await;
        let (tx, mut rx) = mpsc::channel(16);
        f.handler.on_connect(1, peer(), tx);

        request(&f.handler, 1, r#"{"action":"subscribe","channel":"alerts:all"}"#).await;
        let reply = request(&f.handler, 1, r#"{"action":"unsubscribe","channel":"alerts:all"}"#).await;
        assert_eq!(
            reply,
            Reply::Unsubscribed {
                channel: "alerts:all".to_string()
            }
        );
        assert_eq!(f.hub.channel_subscribers(&Channel::AllAlerts), 0);

        assert!(matches!(
            request(&f.handler, 1, "not json").await,
            Reply::Error { .. }
        ));
        assert!(matches!(
            request(&f.handler, 1, r#"{"action":"subscribe","channel":"trades"}"#).await,
            Reply::Error { .. }
        ));
        assert!(matches!(
            request(&f.handler, 1, r#"{"action":"listen","channel":"alerts:all"}"#).await,
            Reply::Error { .. }
        ));
        assert!(rx.try_recv().is_err());

        f.handler.on_disconnect(1);
        assert_eq!(f.hub.subscriber_count(), 0);
        f.hub.publish_alert(&crate::dto::AlertDto {
            id: 1,
            ticker: "BTC".to_string(),
            symbol_name: "Bitcoin".to_string(),
            alert_type: common::AlertType::Anomaly,
            message: "late".to_string(),
            trigger_value: None,
            threshold_value: None,
            is_read: false,
            timestamp: chrono::Utc::now(),
        });
    }
}
