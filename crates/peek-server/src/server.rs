//! Listener setup and the serve task.

use std::net::SocketAddr;

use peek_core::ServerConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ServerError;
use crate::router::build_router;
use crate::state::AppState;

/// A running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<Result<(), ServerError>>,
}

impl ServerHandle {
    /// Returns the address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts graceful shutdown. Open connections close with Normal Closure.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Waits for the serve task to finish.
    ///
    /// # Errors
    ///
    /// Returns the serve loop's I/O error, or [`ServerError::Task`] if the
    /// task panicked.
    pub async fn wait(self) -> Result<(), ServerError> {
        self.task.await?
    }
}

/// Binds the listener and spawns the serve task.
///
/// The server stops accepting once `state.shutdown` is cancelled.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be bound.
pub async fn start(config: &ServerConfig, state: AppState) -> Result<ServerHandle, ServerError> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;

    info!(
        addr = %local_addr,
        path = %state.watched,
        timeout_secs = state.session_timeout.as_secs(),
        "Listening"
    );

    let shutdown = state.shutdown.clone();
    let router = build_router(state, config.assets_dir.as_deref());

    let signal = shutdown.clone().cancelled_owned();
    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(ServerError::Io)
    });

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}
