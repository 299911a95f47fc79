//! Listener and transport failures

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

#[allow(clippy::result_large_err)]
pub type Result<T> = std::result::Result<T, ServerError>;

/// Why a gateway listener could not start or keep serving
#[derive(Error, Debug)]
pub enum ServerError {
    /// A pre-flight probe found the port taken
    #[error("port {port} is unavailable ({reason})")]
    PortTaken { port: u16, reason: String },

    #[error("cannot listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server misconfigured: {0}")]
    Config(String),

    #[error("listener I/O failed: {0}")]
    Io(#[from] io::Error),

    /// WebSocket upgrade or framing failure on a single connection
    #[error("websocket handshake or frame error: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("'{0}' is not a socket address")]
    Address(String),
}

impl ServerError {
    pub fn bind(address: impl ToString, source: io::Error) -> Self {
        Self::Bind {
            address: address.to_string(),
            source,
        }
    }

    pub fn port_in_use(port: u16, reason: impl Into<String>) -> Self {
        Self::PortTaken {
            port,
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Port the error refers to, when there is one
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::PortTaken { port, .. } => Some(*port),
            Self::Bind { address, .. } | Self::Address(address) => address
                .parse::<SocketAddr>()
                .ok()
                .map(|addr| addr.port()),
            _ => None,
        }
    }
}
