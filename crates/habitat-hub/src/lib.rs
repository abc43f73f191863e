//! Client-facing side of the Habitat relay.
//!
//! This crate provides the [`BroadcastHub`] that fans snapshots out to
//! connected dashboards, and an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/` and `/ws`) streaming one JSON snapshot
//!   per tick
//! - **REST endpoints** for the latest snapshot and relay status
//!
//! # Architecture
//!
//! Every connected socket owns a bounded queue registered with the hub.
//! The tick loop calls [`BroadcastHub::broadcast`], which serializes the
//! snapshot once and offers it to each queue without blocking; the socket
//! tasks drain their queues independently. A client that disconnects or
//! falls too far behind is dropped without affecting anyone else.

pub mod error;
pub mod handlers;
pub mod hub;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use hub::{BroadcastHub, BroadcastReport, ClientSubscription, Frame, HubError};
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::{StartupError, spawn_server};
pub use state::AppState;
