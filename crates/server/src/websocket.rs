//! Subscription socket listener on tokio-tungstenite
//!
//! A connection owns a bounded outbound queue. Its sending half is handed to
//! the [`MessageHandler`] on connect so pushes can arrive at any time; the
//! session task interleaves them with direct replies to inbound frames.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use observability::ServerMetrics;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::accept_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use tokio_tungstenite::tungstenite::Message;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::traits::Server;

pub type ConnectionId = u64;

/// Sending half of a connection's outbound queue, one text frame per item
pub type Outbound = mpsc::Sender<String>;

pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Sessions still open after shutdown get this long to say goodbye
const SESSION_DRAIN: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub connected_at: Instant,
}

/// Application side of a socket connection
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// A returned frame is written before anything queued afterwards
    async fn handle(&self, conn_id: ConnectionId, message: Message) -> Option<Message>;

    fn on_connect(&self, _conn_id: ConnectionId, _peer_addr: SocketAddr, _outbound: Outbound) {}

    fn on_disconnect(&self, _conn_id: ConnectionId) {}
}

#[derive(Default)]
struct Registry {
    bound: Mutex<Option<SocketAddr>>,
    last_id: AtomicU64,
    live: Mutex<HashMap<ConnectionId, ConnectionInfo>>,
}

#[derive(Clone)]
pub struct WebSocketServer {
    config: ServerConfig,
    handler: Arc<dyn MessageHandler>,
    outbound_buffer: usize,
    registry: Arc<Registry>,
    metrics: ServerMetrics,
}

impl WebSocketServer {
    pub fn with_handler<H: MessageHandler + 'static>(config: ServerConfig, handler: H) -> Self {
        Self::from_arc(config, Arc::new(handler))
    }

    pub fn from_arc(config: ServerConfig, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            config,
            handler,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            registry: Arc::default(),
            metrics: ServerMetrics::new("websocket"),
        }
    }

    /// Per-connection queue capacity, at least 1
    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity.max(1);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn connection_count(&self) -> usize {
        self.registry.live.lock().len()
    }

    pub fn active_connections(&self) -> Vec<ConnectionInfo> {
        self.registry.live.lock().values().cloned().collect()
    }

    fn opened(&self, id: ConnectionId, peer_addr: SocketAddr, outbound: Outbound) {
        self.registry.live.lock().insert(
            id,
            ConnectionInfo {
                id,
                peer_addr,
                connected_at: Instant::now(),
            },
        );
        self.metrics.connection_opened();
        self.handler.on_connect(id, peer_addr, outbound);
    }

    fn closed(&self, id: ConnectionId) {
        if let Some(info) = self.registry.live.lock().remove(&id) {
            debug!(conn_id = id, lived = ?info.connected_at.elapsed(), "Subscriber disconnected");
        }
        self.metrics.connection_closed();
        self.handler.on_disconnect(id);
    }

    async fn session(
        self,
        id: ConnectionId,
        stream: TcpStream,
        peer_addr: SocketAddr,
        stop: CancellationToken,
    ) -> Result<()> {
        let (mut sink, mut source) = accept_async(stream).await?.split();
        let (outbound, mut queued) = mpsc::channel::<String>(self.outbound_buffer);
        self.opened(id, peer_addr, outbound);

        let mut queue_live = true;
        let outcome: Result<()> = loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break Ok(());
                }
                push = queued.recv(), if queue_live => match push {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            break Err(e.into());
                        }
                    }
                    // all senders gone, only replies remain
                    None => queue_live = false,
                },
                inbound = source.next() => match inbound {
                    Some(Ok(frame)) if frame.is_close() => break Ok(()),
                    Some(Ok(frame)) => {
                        if let Some(reply) = self.handler.handle(id, frame).await {
                            if let Err(e) = sink.send(reply).await {
                                break Err(e.into());
                            }
                        }
                    }
                    Some(Err(e)) => break Err(e.into()),
                    None => break Ok(()),
                },
            }
        };

        self.closed(id);
        outcome
    }
}

#[async_trait]
impl Server for WebSocketServer {
    fn name(&self) -> &str {
        "websocket"
    }

    fn address(&self) -> Option<SocketAddr> {
        *self.registry.bound.lock()
    }

    fn is_running(&self) -> bool {
        self.address().is_some()
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let addr = match self.config.websocket_addr() {
            Some(addr) => addr?,
            None => return Err(ServerError::config("no WebSocket port configured")),
        };
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;
        *self.registry.bound.lock() = Some(listener.local_addr()?);
        info!(addr = ?self.address(), "Subscription socket listening");

        let mut sessions = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };
                    let id = self.registry.last_id.fetch_add(1, Ordering::Relaxed) + 1;
                    let session = self.clone().session(id, stream, peer_addr, shutdown.child_token());
                    sessions.spawn(async move {
                        if let Err(e) = session.await {
                            debug!(conn_id = id, error = %e, "Session ended with an error");
                        }
                    });
                }
            }
        }

        if !sessions.is_empty() {
            info!(open = sessions.len(), "Closing subscriber sessions");
            let drained = tokio::time::timeout(SESSION_DRAIN, async {
                while sessions.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!(left = sessions.len(), "Abandoning sessions that did not close in time");
                sessions.abort_all();
            }
        }

        self.registry.bound.lock().take();
        info!("Subscription socket stopped");
        Ok(())
    }
}
