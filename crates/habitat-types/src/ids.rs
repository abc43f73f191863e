//! Identifier types.
//!
//! Robots are identified by the stable name they carry in the simulation
//! scene ([`RobotId`]); the simulator hands back an integer object handle
//! ([`RobotHandle`]) when a name is resolved. Connected dashboard clients get
//! a time-ordered UUID ([`ClientId`]) so log lines can be correlated across
//! connect, send, and disconnect.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Stable scene name of a tracked robot (e.g. `SCOUT-1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RobotId(String);

impl RobotId {
    /// Wrap a scene object name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The scene object name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the float signal carrying this robot's battery level.
    pub fn battery_signal(&self) -> String {
        format!("{}_battery", self.0)
    }

    /// Name of the string signal carrying this robot's status.
    pub fn status_signal(&self) -> String {
        format!("{}_status", self.0)
    }
}

impl core::fmt::Display for RobotId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RobotId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Opaque object handle issued by the simulator.
///
/// Only meaningful for the simulation connection that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RobotHandle(pub i64);

impl core::fmt::Display for RobotHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a connected streaming client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ClientId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
