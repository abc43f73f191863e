//! Shared telemetry types for the Habitat relay.
//!
//! This crate is the single source of truth for the JSON payload pushed to
//! dashboard clients every tick. Types defined here flow downstream to
//! `TypeScript` via `ts-rs` for the habitat dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Robot names, simulator object handles, and client IDs
//! - [`enums`] -- Alert severity levels
//! - [`telemetry`] -- Snapshot, robot, environment, and alert payloads

pub mod enums;
pub mod ids;
pub mod telemetry;

// Re-export all public types at crate root for convenience.
pub use enums::AlertLevel;
pub use ids::{ClientId, RobotHandle, RobotId};
pub use telemetry::{Alert, EnvironmentReading, Position, RobotReading, Snapshot};
