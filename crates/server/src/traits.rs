//! Listener lifecycle

use async_trait::async_trait;
use std::future::Future;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::shutdown::ShutdownController;

/// Something that binds a socket and serves until told to stop
#[async_trait]
pub trait Server: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Local address once bound
    fn address(&self) -> Option<SocketAddr>;

    fn is_running(&self) -> bool;

    /// Serve until `shutdown` fires. Bind failures are returned, a drained
    /// shutdown is `Ok`.
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}

pub trait ServerExt: Server + Sized {
    /// Move the server onto its own task
    fn spawn(self) -> (JoinHandle<Result<()>>, CancellationToken) {
        let stop = CancellationToken::new();
        let handle = tokio::spawn({
            let stop = stop.clone();
            async move { self.run(stop).await }
        });
        (handle, stop)
    }

    fn run_with_ctrl_c(self) -> impl Future<Output = Result<()>> + Send {
        async move { self.run(ShutdownController::with_ctrl_c().token()).await }
    }
}

impl<T: Server> ServerExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Counts how often it was asked to stop
    struct Parked {
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Server for Parked {
        fn name(&self) -> &str {
            "parked"
        }

        fn address(&self) -> Option<SocketAddr> {
            None
        }

        fn is_running(&self) -> bool {
            self.stops.load(Ordering::SeqCst) == 0
        }

        async fn run(&self, shutdown: CancellationToken) -> Result<()> {
            shutdown.cancelled().await;
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_spawned_server_returns_after_cancel() {
        let stops = Arc::new(AtomicUsize::new(0));
        let (handle, stop) = Parked {
            stops: stops.clone(),
        }
        .spawn();

        stop.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap();
        assert!(joined.unwrap().is_ok());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
