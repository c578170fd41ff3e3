//! Inbound service lifecycle: bind, serve, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use paychan_core::error::Result;

use crate::routes::create_router;
use crate::state::AppState;

/// A running inbound service. Owns the listening socket.
pub struct InboundService {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl InboundService {
    /// Binds `addr` and starts serving in the background.
    pub async fn start(addr: SocketAddr, state: Arc<AppState>, max_body_bytes: usize) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let router = create_router(state, max_body_bytes);
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let served = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = signal.await;
            })
            .await;

            if let Err(e) = served {
                error!(error = %e, "Inbound service stopped with error");
            }
        });

        info!(addr = %local_addr, "Listening");
        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    /// Address the service is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "Inbound service task failed");
        }
        info!(addr = %self.local_addr, "Stopped listening");
    }
}
