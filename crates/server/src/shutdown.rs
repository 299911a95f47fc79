//! Process shutdown
//!
//! The controller's token is the root of a tree: each listener runs on a
//! child, and each WebSocket session on a grandchild.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone, Default)]
pub struct ShutdownController {
    root: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller cancelled by SIGINT, or SIGTERM on unix
    pub fn with_ctrl_c() -> Self {
        let controller = Self::new();
        let root = controller.root.clone();
        tokio::spawn(async move {
            let signal = termination().await;
            info!(signal, "Stopping gateway");
            root.cancel();
        });
        controller
    }

    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.root.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.root.cancelled().await
    }
}

async fn interrupt() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // without a handler the process can still be killed
        warn!(error = %e, "SIGINT handler unavailable");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

#[cfg(unix)]
async fn termination() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => tokio::select! {
            name = interrupt() => name,
            _ = term.recv() => "SIGTERM",
        },
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            interrupt().await
        }
    }
}

#[cfg(not(unix))]
async fn termination() -> &'static str {
    interrupt().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_reaches_every_child() {
        let controller = ShutdownController::new();
        let http = controller.child_token();
        let ws = controller.child_token();
        let session = ws.child_token();

        session.cancel();
        assert!(!ws.is_cancelled());
        assert!(!controller.is_cancelled());

        controller.shutdown();
        controller.wait_for_shutdown().await;
        assert!(http.is_cancelled());
        assert!(ws.is_cancelled());
    }
}
