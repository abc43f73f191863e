//! Task and alert providers.
//!
//! Robots have no real task assignment yet and no alert pipeline exists, so
//! both fields of the snapshot come from placeholder providers. The traits
//! let a real task planner or alert detector be dropped in without changing
//! the snapshot schema.

use chrono::NaiveTime;
use habitat_types::{Alert, AlertLevel, RobotId};

/// Placeholder task reported for every robot.
pub const PLACEHOLDER_TASK: &str = "Mapping Sector A";

/// Supplies the `task` field of each robot reading.
pub trait TaskProvider: Send + Sync {
    /// The task currently assigned to `robot`.
    fn task_for(&self, robot: &RobotId) -> String;
}

/// Supplies the `alerts` list of each snapshot.
pub trait AlertProvider: Send + Sync {
    /// Alerts to publish this tick, in display order.
    fn current_alerts(&self) -> Vec<Alert>;
}

/// Reports the same task for every robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTaskProvider {
    task: String,
}

impl StaticTaskProvider {
    /// Report `task` for every robot.
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into() }
    }
}

impl Default for StaticTaskProvider {
    fn default() -> Self {
        Self::new(PLACEHOLDER_TASK)
    }
}

impl TaskProvider for StaticTaskProvider {
    fn task_for(&self, _robot: &RobotId) -> String {
        self.task.clone()
    }
}

/// Reports a fixed alert list every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAlertProvider {
    alerts: Vec<Alert>,
}

impl StaticAlertProvider {
    /// Report exactly `alerts` every tick.
    pub const fn new(alerts: Vec<Alert>) -> Self {
        Self { alerts }
    }
}

impl Default for StaticAlertProvider {
    /// The two demo alerts the dashboard was designed around.
    fn default() -> Self {
        Self::new(vec![
            Alert::new(
                1,
                AlertLevel::Info,
                "Sector scan complete",
                NaiveTime::from_hms_opt(14, 23, 0).unwrap_or(NaiveTime::MIN),
            ),
            Alert::new(
                2,
                AlertLevel::Warning,
                "Radiation spike detected",
                NaiveTime::from_hms_opt(14, 18, 0).unwrap_or(NaiveTime::MIN),
            ),
        ])
    }
}

impl AlertProvider for StaticAlertProvider {
    fn current_alerts(&self) -> Vec<Alert> {
        self.alerts.clone()
    }
}
