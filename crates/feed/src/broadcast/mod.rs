//! Fan-out of persisted prices and alerts to subscribers
//!
//! Publishing is best effort and at most once: a publish never fails or blocks
//! the caller, and having no subscribers is not an error.

mod hub;
#[cfg(test)]
mod recording;

pub use hub::SubscriptionHub;
#[cfg(test)]
pub use recording::RecordingBroadcaster;

use async_trait::async_trait;
use serde::Serialize;

use crate::dto::{AlertDto, PriceDto};

/// Channel name for every price update
pub const PRICES_ALL: &str = "prices:all";

/// Channel name for every alert
pub const ALERTS_ALL: &str = "alerts:all";

const PRICES_PREFIX: &str = "prices:";

/// A subscription topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    AllPrices,
    /// Updates of one upper-cased ticker
    Prices(String),
    AllAlerts,
}

impl Channel {
    pub fn prices(ticker: &str) -> Self {
        Channel::Prices(common::normalize_ticker(ticker))
    }

    /// Parse a channel name; the ticker part is case-insensitive
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name == PRICES_ALL {
            return Some(Channel::AllPrices);
        }
        if name == ALERTS_ALL {
            return Some(Channel::AllAlerts);
        }
        match name.strip_prefix(PRICES_PREFIX) {
            Some(ticker) if !ticker.trim().is_empty() => Some(Channel::prices(ticker)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::AllPrices => f.write_str(PRICES_ALL),
            Channel::Prices(ticker) => write!(f, "{}{}", PRICES_PREFIX, ticker),
            Channel::AllAlerts => f.write_str(ALERTS_ALL),
        }
    }
}

/// Payload pushed to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Price(PriceDto),
    Alert(AlertDto),
    /// Latest prices sent right after subscribing to `prices:all`
    Snapshot(Vec<PriceDto>),
    /// Latest price sent right after subscribing to `prices:<TICKER>`
    TickerSnapshot(PriceDto),
}

#[derive(Serialize)]
struct PushFrame<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    channel: String,
    data: &'a T,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Price(_) => "price",
            Event::Alert(_) => "alert",
            Event::Snapshot(_) | Event::TickerSnapshot(_) => "snapshot",
        }
    }

    /// Render as `{"type":..,"channel":..,"data":..}`
    pub fn to_frame(&self, channel: &Channel) -> serde_json::Result<String> {
        let kind = self.kind();
        let channel = channel.to_string();
        match self {
            Event::Price(data) | Event::TickerSnapshot(data) => {
                serde_json::to_string(&PushFrame { kind, channel, data })
            }
            Event::Alert(data) => serde_json::to_string(&PushFrame { kind, channel, data }),
            Event::Snapshot(data) => serde_json::to_string(&PushFrame { kind, channel, data }),
        }
    }
}

/// Publishes events to whoever is subscribed to a channel
pub trait Broadcaster: Send + Sync {
    fn publish(&self, channel: &Channel, event: &Event);

    /// Publish on `prices:all` and `prices:<TICKER>`
    fn publish_price(&self, price: &PriceDto) {
        let event = Event::Price(price.clone());
        self.publish(&Channel::AllPrices, &event);
        self.publish(&Channel::prices(&price.ticker), &event);
    }

    /// Publish on `alerts:all`
    fn publish_alert(&self, alert: &AlertDto) {
        self.publish(&Channel::AllAlerts, &Event::Alert(alert.clone()));
    }
}

/// Read side consulted when a subscriber joins a price channel
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Latest observation of every symbol that has one
    async fn latest_all(&self) -> common::Result<Vec<PriceDto>>;

    /// Latest observation of `ticker`; `NotFound` when the ticker is unknown
    async fn latest_for(&self, ticker: &str) -> common::Result<Option<PriceDto>>;
}
