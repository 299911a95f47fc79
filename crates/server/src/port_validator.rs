//! Pre-flight port probing
//!
//! A probe binds and releases each port, so it only reports the state at the
//! time of the check. The bind in `run` still decides.

use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Listeners declared by a config, labelled for log output
fn declared_listeners(config: &ServerConfig) -> impl Iterator<Item = (&'static str, u16)> {
    [("rest", config.http_port), ("websocket", config.websocket_port)]
        .into_iter()
        .filter_map(|(label, port)| Some((label, port?)))
}

/// Fail fast when a declared port is invalid or already bound elsewhere
pub async fn validate_ports_available(config: &ServerConfig) -> Result<()> {
    validate_config_ports(config)?;

    for (label, port) in declared_listeners(config) {
        if let Err(e) = TcpListener::bind((config.host.as_str(), port)).await {
            warn!(listener = label, port, error = %e, "Port probe failed");
            return Err(ServerError::port_in_use(port, e.to_string()));
        }
        debug!(listener = label, port, "Port is free");
    }
    Ok(())
}

pub async fn is_port_in_use(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).await.is_err()
}

/// Port 0 asks the OS for an ephemeral port, which a deployment cannot
/// publish, so it is rejected here.
pub fn validate_port_range(port: u16) -> Result<()> {
    match port {
        0 => Err(ServerError::config("port 0 cannot be used for a published listener")),
        1..=1023 => {
            warn!(port, "Binding a privileged port");
            Ok(())
        }
        _ => Ok(()),
    }
}

pub fn validate_config_ports(config: &ServerConfig) -> Result<()> {
    let mut seen: Option<u16> = None;
    for (_, port) in declared_listeners(config) {
        validate_port_range(port)?;
        if seen == Some(port) {
            return Err(ServerError::config(format!(
                "REST and WebSocket listeners both use port {}",
                port
            )));
        }
        seen = Some(port);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_zero_rejected() {
        assert!(validate_port_range(0).is_err());
        assert!(validate_port_range(443).is_ok());
        assert!(validate_port_range(u16::MAX).is_ok());
    }

    #[test]
    fn test_listeners_must_not_share_a_port() {
        let shared = ServerConfig::new("127.0.0.1", 8080, 8080);
        assert!(matches!(
            validate_config_ports(&shared),
            Err(ServerError::Config(_))
        ));
        assert!(validate_config_ports(&ServerConfig::new("127.0.0.1", 8080, 7080)).is_ok());
    }

    #[tokio::test]
    async fn test_occupied_port_is_reported() {
        let held = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = held.local_addr().unwrap().port();
        assert!(is_port_in_use("127.0.0.1", port).await);

        let err = validate_ports_available(&ServerConfig::http_only("127.0.0.1", port))
            .await
            .unwrap_err();
        assert_eq!(err.port(), Some(port));
    }
}
