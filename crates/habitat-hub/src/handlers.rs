//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/snapshot` | Most recently published snapshot |
//! | `GET` | `/api/status` | Client count and tick counters |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use habitat_types::Snapshot;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    /// Connected streaming clients.
    pub clients: usize,
    /// Ticks that published a snapshot.
    pub ticks_published: u64,
    /// Ticks skipped after a failed assembly.
    pub ticks_skipped: u64,
    /// Configured milliseconds between ticks.
    pub tick_interval_ms: u64,
    /// Seconds since the relay started.
    pub uptime_seconds: u64,
}

/// Return the most recent snapshot.
///
/// # Route
///
/// `GET /api/snapshot`
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] until the first tick is published.
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Result<Json<Snapshot>, ApiError> {
    state
        .hub
        .latest()
        .map(|snapshot| Json(Snapshot::clone(&snapshot)))
        .ok_or_else(|| ApiError::NotFound(String::from("no snapshot has been published yet")))
}

/// Report relay health.
///
/// # Route
///
/// `GET /api/status`
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        clients: state.hub.client_count(),
        ticks_published: state.control.ticks_published(),
        ticks_skipped: state.control.ticks_skipped(),
        tick_interval_ms: state.control.tick_interval_ms(),
        uptime_seconds: state.control.uptime_seconds(),
    })
}
