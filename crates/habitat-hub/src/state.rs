//! Shared application state for the relay server.
//!
//! [`AppState`] bundles the [`BroadcastHub`] that WebSocket handlers
//! register with and the [`RelayControl`] the status endpoint reports on.

use std::sync::Arc;

use habitat_core::control::RelayControl;

use crate::hub::BroadcastHub;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Client set and latest snapshot.
    pub hub: Arc<BroadcastHub>,
    /// Stop signal and tick counters of the relay loop.
    pub control: Arc<RelayControl>,
}

impl AppState {
    /// Create application state around an existing hub and control.
    pub const fn new(hub: Arc<BroadcastHub>, control: Arc<RelayControl>) -> Self {
        Self { hub, control }
    }
}
