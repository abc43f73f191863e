//! Server startup helper for embedding in the relay binary.
//!
//! Provides [`spawn_server`], which binds the listening socket and launches
//! the Axum server on a background Tokio task so it runs concurrently with
//! the tick loop.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the relay server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the relay server on a background Tokio task.
///
/// The socket is bound before this returns, so a port conflict surfaces
/// here rather than inside the task. The server stops gracefully once the
/// relay control's stop signal fires; the caller should await the returned
/// handle during shutdown.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the listening socket cannot be bound.
pub async fn spawn_server(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let listener = server::bind(config).await?;

    let control = Arc::clone(&state.control);
    let shutdown = async move { control.stopped().await };

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Relay server exited with error");
        }
    });

    tracing::info!(port = config.port, "Relay server spawned on background task");

    Ok(handle)
}
