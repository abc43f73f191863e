//! Axum router construction for the relay server.
//!
//! Assembles all routes (`WebSocket` + REST) into a single [`Router`] with
//! CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- `WebSocket` snapshot stream (what the dashboard dials)
/// - `GET /ws` -- the same stream at an explicit path
/// - `GET /api/snapshot` -- most recent snapshot
/// - `GET /api/status` -- client count and tick counters
///
/// CORS allows any origin so a dashboard dev server can poll the REST
/// endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/", get(ws::ws_snapshots))
        .route("/ws", get(ws::ws_snapshots))
        // REST API
        .route("/api/snapshot", get(handlers::get_snapshot))
        .route("/api/status", get(handlers::get_status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
