//! Per-tick snapshot assembly.
//!
//! Each tick the assembler walks the tracked robots in configuration order,
//! then the four environment channels, issuing one gateway query at a time,
//! and turns the raw answers into a [`Snapshot`]:
//!
//! - **Position** -- `display = sim * 100 + 200` on each axis. This maps
//!   simulation meters onto the dashboard's ~400x400 map centered on the
//!   scene origin. It is a fixed convention of the dashboard, not a setting.
//! - **Battery** -- truncated to an integer percent, clamped to 0..=100;
//!   100 when the signal is absent.
//! - **Status** -- `"active"` when the signal is absent or empty.
//! - **Environment** -- rounded to two decimals; baseline value when absent.
//!
//! Assembly is all-or-nothing. If any read fails at the protocol level the
//! whole snapshot is abandoned: a robot without a position cannot be drawn,
//! and a snapshot missing a robot would be indistinguishable from that robot
//! leaving the scene.

use habitat_types::{EnvironmentReading, Position, RobotHandle, RobotId, RobotReading, Snapshot};
use tracing::{debug, warn};

use crate::config::EnvironmentSignals;
use crate::gateway::{ReadError, SimPosition, SimulationGateway};
use crate::provider::{AlertProvider, StaticAlertProvider, StaticTaskProvider, TaskProvider};

/// Battery level reported when a robot publishes none.
pub const DEFAULT_BATTERY_PERCENT: u8 = 100;

/// Status reported when a robot publishes none.
pub const DEFAULT_STATUS: &str = "active";

/// Environment values reported when the sensor array publishes none.
pub const BASELINE_ENVIRONMENT: EnvironmentReading = EnvironmentReading {
    o2: 21.0,
    pressure: 101.3,
    temperature: 22.0,
    radiation: 0.1,
};

/// Display units per simulation meter.
const DISPLAY_SCALE: f64 = 100.0;

/// Display coordinate of the scene origin.
const DISPLAY_OFFSET: f64 = 200.0;

/// Errors that abort a tick's snapshot.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// A robot's position could not be read.
    #[error("position read failed for {robot}: {source}")]
    Position {
        /// The robot being read.
        robot: RobotId,
        /// The underlying read error.
        source: ReadError,
    },

    /// A signal could not be read.
    #[error("signal read failed for {signal}: {source}")]
    Signal {
        /// The signal name.
        signal: String,
        /// The underlying read error.
        source: ReadError,
    },
}

/// A robot whose handle resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRobot {
    /// Scene name.
    pub id: RobotId,
    /// Handle issued by the simulator.
    pub handle: RobotHandle,
}

/// Resolve every configured robot name, in order.
///
/// Robots the scene does not contain are logged and left out for the rest of
/// the process; they are never retried.
///
/// # Errors
///
/// Returns [`ReadError`] if a lookup fails at the protocol level.
pub async fn resolve_tracked_robots<G: SimulationGateway>(
    gateway: &mut G,
    names: &[String],
) -> Result<Vec<TrackedRobot>, ReadError> {
    let mut tracked = Vec::with_capacity(names.len());
    for name in names {
        match gateway.resolve_handle(name).await? {
            Some(handle) => {
                debug!(robot = %name, %handle, "Resolved robot handle");
                tracked.push(TrackedRobot {
                    id: RobotId::new(name.as_str()),
                    handle,
                });
            }
            None => {
                warn!(robot = %name, "Robot not found in scene, it will not be reported");
            }
        }
    }
    Ok(tracked)
}

/// Map a simulation position onto dashboard coordinates.
pub fn to_display(position: SimPosition) -> Position {
    Position {
        x: position.x.mul_add(DISPLAY_SCALE, DISPLAY_OFFSET),
        y: position.y.mul_add(DISPLAY_SCALE, DISPLAY_OFFSET),
    }
}

/// Battery percent from a raw signal value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn battery_percent(raw: Option<f64>) -> u8 {
    match raw {
        // Clamped to 0..=100 and truncated, so the cast is exact.
        Some(value) if value.is_finite() => value.clamp(0.0, 100.0).trunc() as u8,
        _ => DEFAULT_BATTERY_PERCENT,
    }
}

/// Status string, substituting [`DEFAULT_STATUS`] for absent or empty values.
pub fn status_or_default(raw: Option<String>) -> String {
    match raw {
        Some(status) if !status.is_empty() => status,
        _ => DEFAULT_STATUS.to_owned(),
    }
}

/// Round to two decimal places.
///
/// Rounds the exact binary value with ties to even, so `2.675` (stored just
/// below) becomes `2.67` and `0.125` becomes `0.12`.
pub fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

/// Environment value: rounded reading, or `baseline` when absent or not
/// representable.
fn environment_value(raw: Option<f64>, baseline: f64) -> f64 {
    match raw.map(round2) {
        Some(value) if value.is_finite() => value,
        _ => baseline,
    }
}

/// Builds one [`Snapshot`] per tick from gateway reads.
#[derive(Debug, Clone)]
pub struct SnapshotAssembler<T = StaticTaskProvider, A = StaticAlertProvider> {
    robots: Vec<TrackedRobot>,
    signals: EnvironmentSignals,
    tasks: T,
    alerts: A,
}

impl SnapshotAssembler {
    /// Assembler with the placeholder task and alert providers.
    pub fn new(robots: Vec<TrackedRobot>, signals: EnvironmentSignals) -> Self {
        Self::with_providers(
            robots,
            signals,
            StaticTaskProvider::default(),
            StaticAlertProvider::default(),
        )
    }
}

impl<T: TaskProvider, A: AlertProvider> SnapshotAssembler<T, A> {
    /// Assembler with custom providers.
    pub const fn with_providers(
        robots: Vec<TrackedRobot>,
        signals: EnvironmentSignals,
        tasks: T,
        alerts: A,
    ) -> Self {
        Self {
            robots,
            signals,
            tasks,
            alerts,
        }
    }

    /// Robots included in every snapshot, in order.
    pub fn tracked(&self) -> &[TrackedRobot] {
        &self.robots
    }

    /// Query the gateway and build this tick's snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] on the first failed read; no partial
    /// snapshot is produced.
    pub async fn assemble<G: SimulationGateway>(
        &self,
        gateway: &mut G,
    ) -> Result<Snapshot, AssemblyError> {
        let mut robots = Vec::with_capacity(self.robots.len());
        for robot in &self.robots {
            robots.push(self.read_robot(gateway, robot).await?);
        }

        let environment = self.read_environment(gateway).await?;

        Ok(Snapshot {
            robots,
            environment,
            alerts: self.alerts.current_alerts(),
        })
    }

    async fn read_robot<G: SimulationGateway>(
        &self,
        gateway: &mut G,
        robot: &TrackedRobot,
    ) -> Result<RobotReading, AssemblyError> {
        let position = gateway
            .read_position(robot.handle)
            .await
            .map_err(|source| AssemblyError::Position {
                robot: robot.id.clone(),
                source,
            })?;
        let display = to_display(position);
        if !(display.x.is_finite() && display.y.is_finite()) {
            return Err(AssemblyError::Position {
                robot: robot.id.clone(),
                source: ReadError::Protocol {
                    op: "get_object_position",
                    message: format!(
                        "position ({}, {}) is outside the display range",
                        position.x, position.y
                    ),
                },
            });
        }

        let battery_signal = robot.id.battery_signal();
        let battery = read_float(gateway, &battery_signal).await?;

        let status_signal = robot.id.status_signal();
        let status = gateway
            .read_string_signal(&status_signal)
            .await
            .map_err(|source| AssemblyError::Signal {
                signal: status_signal,
                source,
            })?;

        Ok(RobotReading {
            id: robot.id.clone(),
            status: status_or_default(status),
            battery_percent: battery_percent(battery),
            position: display,
            task: self.tasks.task_for(&robot.id),
        })
    }

    async fn read_environment<G: SimulationGateway>(
        &self,
        gateway: &mut G,
    ) -> Result<EnvironmentReading, AssemblyError> {
        let o2 = read_float(gateway, &self.signals.o2_signal).await?;
        let pressure = read_float(gateway, &self.signals.pressure_signal).await?;
        let temperature = read_float(gateway, &self.signals.temperature_signal).await?;
        let radiation = read_float(gateway, &self.signals.radiation_signal).await?;

        Ok(EnvironmentReading {
            o2: environment_value(o2, BASELINE_ENVIRONMENT.o2),
            pressure: environment_value(pressure, BASELINE_ENVIRONMENT.pressure),
            temperature: environment_value(temperature, BASELINE_ENVIRONMENT.temperature),
            radiation: environment_value(radiation, BASELINE_ENVIRONMENT.radiation),
        })
    }
}

async fn read_float<G: SimulationGateway>(
    gateway: &mut G,
    signal: &str,
) -> Result<Option<f64>, AssemblyError> {
    gateway
        .read_float_signal(signal)
        .await
        .map_err(|source| AssemblyError::Signal {
            signal: signal.to_owned(),
            source,
        })
}
