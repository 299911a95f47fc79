//! In-process subscription registry

use observability::FeedMetrics;
use parking_lot::RwLock;
use server::{ConnectionId, Outbound};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::{Broadcaster, Channel, Event};

struct Subscriber {
    outbound: Outbound,
    channels: HashSet<Channel>,
}

/// Routes published events to the outbound queues of interested connections
///
/// Each connection registers its bounded queue once; delivery uses `try_send`,
/// so a slow subscriber loses messages instead of stalling publishers.
pub struct SubscriptionHub {
    subscribers: RwLock<HashMap<ConnectionId, Subscriber>>,
    metrics: FeedMetrics,
}

impl SubscriptionHub {
    pub fn new(metrics: FeedMetrics) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Track a new connection with no channel interest yet
    pub fn register(&self, conn_id: ConnectionId, outbound: Outbound) {
        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(
                conn_id,
                Subscriber {
                    outbound,
                    channels: HashSet::new(),
                },
            );
            subscribers.len()
        };
        self.metrics.set_subscribers(count);
        debug!(conn_id, "Subscriber registered");
    }

    pub fn unregister(&self, conn_id: ConnectionId) {
        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.remove(&conn_id);
            subscribers.len()
        };
        self.metrics.set_subscribers(count);
        debug!(conn_id, "Subscriber unregistered");
    }

    /// Add interest in `channel`; false when the connection is not registered
    pub fn subscribe(&self, conn_id: ConnectionId, channel: Channel) -> bool {
        match self.subscribers.write().get_mut(&conn_id) {
            Some(subscriber) => {
                subscriber.channels.insert(channel);
                true
            }
            None => false,
        }
    }

    /// Remove interest in `channel`; false when it was not subscribed
    pub fn unsubscribe(&self, conn_id: ConnectionId, channel: &Channel) -> bool {
        self.subscribers
            .write()
            .get_mut(&conn_id)
            .is_some_and(|subscriber| subscriber.channels.remove(channel))
    }

    pub fn is_subscribed(&self, conn_id: ConnectionId, channel: &Channel) -> bool {
        self.subscribers
            .read()
            .get(&conn_id)
            .is_some_and(|subscriber| subscriber.channels.contains(channel))
    }

    /// Queue one event for a single connection, whatever its subscriptions
    pub fn send_to(&self, conn_id: ConnectionId, channel: &Channel, event: &Event) -> bool {
        let frame = match event.to_frame(channel) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%e, %channel, "Failed to encode event");
                return false;
            }
        };

        let outbound = match self.subscribers.read().get(&conn_id) {
            Some(subscriber) => subscriber.outbound.clone(),
            None => return false,
        };
        self.deliver(conn_id, &outbound, frame)
    }

    /// Number of registered connections
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Number of connections interested in `channel`
    pub fn channel_subscribers(&self, channel: &Channel) -> usize {
        self.subscribers
            .read()
            .values()
            .filter(|subscriber| subscriber.channels.contains(channel))
            .count()
    }

    fn deliver(&self, conn_id: ConnectionId, outbound: &Outbound, frame: String) -> bool {
        match outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(conn_id, "Subscriber queue full, dropping message");
                self.metrics.broadcast_dropped("full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn_id, "Subscriber queue closed, dropping message");
                self.metrics.broadcast_dropped("closed");
                false
            }
        }
    }
}

impl Broadcaster for SubscriptionHub {
    fn publish(&self, channel: &Channel, event: &Event) {
        let targets: Vec<(ConnectionId, Outbound)> = self
            .subscribers
            .read()
            .iter()
            .filter(|(_, subscriber)| subscriber.channels.contains(channel))
            .map(|(id, subscriber)| (*id, subscriber.outbound.clone()))
            .collect();

        if targets.is_empty() {
            return;
        }

        let frame = match event.to_frame(channel) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%e, %channel, "Failed to encode event");
                return;
            }
        };

        let mut closed = Vec::new();
        for (conn_id, outbound) in &targets {
            if !self.deliver(*conn_id, outbound, frame.clone()) && outbound.is_closed() {
                closed.push(*conn_id);
            }
        }

        if !closed.is_empty() {
            let count = {
                let mut subscribers = self.subscribers.write();
                for conn_id in &closed {
                    subscribers.remove(conn_id);
                }
                subscribers.len()
            };
            self.metrics.set_subscribers(count);
        }
    }
}
