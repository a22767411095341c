//! Listener abstraction shared by transports.

use std::net::SocketAddr;

use async_trait::async_trait;
use funnel_framework::Dispatcher;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};

/// A network front-end that feeds inbound requests to a [`Dispatcher`].
#[async_trait]
pub trait Listener: Send + Sync {
    /// Binds `addr` and starts serving in the background.
    ///
    /// Returns once the socket is bound; the returned handle stops the
    /// listener.
    async fn listen(&self, addr: &str, dispatcher: Dispatcher) -> TransportResult<ListenerHandle>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Handle to a running listener.
///
/// Dropping the handle cancels the listener without waiting for it.
#[derive(Debug)]
pub struct ListenerHandle {
    id: String,
    local_addr: SocketAddr,
    shutdown_token: CancellationToken,
    task: Option<JoinHandle<TransportResult<()>>>,
}

impl ListenerHandle {
    /// Creates a handle for a spawned serve task.
    pub fn new(
        id: impl Into<String>,
        local_addr: SocketAddr,
        shutdown_token: CancellationToken,
        task: JoinHandle<TransportResult<()>>,
    ) -> Self {
        Self {
            id: id.into(),
            local_addr,
            shutdown_token,
            task: Some(task),
        }
    }

    /// Identifier for logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The bound address, including an OS-assigned port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A token that is cancelled when the listener is asked to stop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Whether shutdown has been requested.
    pub fn is_stopping(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Requests a graceful stop without waiting.
    pub fn stop(&self) {
        self.shutdown_token.cancel();
    }

    /// Requests a graceful stop and waits for in-flight requests to finish.
    pub async fn shutdown(mut self) -> TransportResult<()> {
        self.shutdown_token.cancel();
        self.join().await
    }

    /// Waits for the serve task to end on its own or after [`stop`](Self::stop).
    pub async fn wait(mut self) -> TransportResult<()> {
        self.join().await
    }

    async fn join(&mut self) -> TransportResult<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        match task.await {
            Ok(result) => {
                debug!(id = %self.id, "Listener stopped");
                result
            }
            Err(e) => {
                warn!(id = %self.id, error = %e, "Listener task did not finish cleanly");
                Err(TransportError::Join(e.to_string()))
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
