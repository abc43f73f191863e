//! Telemetry payload pushed to dashboard clients.
//!
//! One [`Snapshot`] is produced per tick and serialized to a single JSON
//! text frame. Field names and nesting are a compatibility contract with the
//! dashboard:
//!
//! ```json
//! {
//!   "robots": [{"name": "SCOUT-1", "status": "active", "battery": 87,
//!               "position": {"x": 212.5, "y": 180.0}, "task": "Mapping Sector A"}],
//!   "environment": {"O2": 21.0, "Pressure": 101.3, "Temperature": 22.0, "Radiation": 0.1},
//!   "alerts": [{"id": 1, "level": "info", "msg": "Sector scan complete", "time": "14:23"}]
//! }
//! ```

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::AlertLevel;
use crate::ids::RobotId;

/// Position on the dashboard map, in display units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Horizontal map coordinate.
    pub x: f64,
    /// Vertical map coordinate.
    pub y: f64,
}

/// One robot's normalized reading for a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RobotReading {
    /// Scene name of the robot.
    #[serde(rename = "name")]
    pub id: RobotId,
    /// Status string published by the robot (`"active"` when absent).
    pub status: String,
    /// Battery charge, 0 to 100.
    #[serde(rename = "battery")]
    pub battery_percent: u8,
    /// Position on the dashboard map.
    pub position: Position,
    /// Task currently assigned to the robot.
    pub task: String,
}

/// Ambient conditions reported by the habitat sensor array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EnvironmentReading {
    /// Oxygen concentration in percent.
    #[serde(rename = "O2")]
    pub o2: f64,
    /// Atmospheric pressure in kPa.
    #[serde(rename = "Pressure")]
    pub pressure: f64,
    /// Air temperature in degrees Celsius.
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    /// Radiation level.
    #[serde(rename = "Radiation")]
    pub radiation: f64,
}

/// A dashboard alert entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Alert {
    /// Alert number, unique within a snapshot.
    pub id: u32,
    /// Severity.
    pub level: AlertLevel,
    /// Human-readable message.
    pub msg: String,
    /// Wall-clock time the alert was raised, formatted `HH:MM`.
    pub time: String,
}

impl Alert {
    /// Build an alert, formatting `raised_at` as `HH:MM`.
    pub fn new(id: u32, level: AlertLevel, msg: impl Into<String>, raised_at: NaiveTime) -> Self {
        Self {
            id,
            level,
            msg: msg.into(),
            time: raised_at.format("%H:%M").to_string(),
        }
    }
}

/// The complete telemetry payload for one tick.
///
/// Robots appear in tracked-robot configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// One reading per tracked robot.
    pub robots: Vec<RobotReading>,
    /// Ambient sensor readings.
    pub environment: EnvironmentReading,
    /// Active alerts.
    pub alerts: Vec<Alert>,
}
