//! In-memory [`SimulationGateway`] driven by a script.
//!
//! [`ScriptedGateway`] answers queries from maps the caller fills in, and
//! can be told to fail specific reads. It exists so the assembler and
//! scheduler can be exercised without a simulator process, and records every
//! query it receives so tests can assert on read order.

use std::collections::{BTreeMap, BTreeSet};

use habitat_types::RobotHandle;

use crate::gateway::{ReadError, SimPosition, SimulationGateway};

/// A gateway whose answers are set up ahead of time.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    handles: BTreeMap<String, RobotHandle>,
    positions: BTreeMap<RobotHandle, SimPosition>,
    floats: BTreeMap<String, f64>,
    strings: BTreeMap<String, String>,
    failing_positions: BTreeSet<RobotHandle>,
    failing_signals: BTreeSet<String>,
    log: Vec<String>,
}

impl ScriptedGateway {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named object at `position` (world meters).
    #[must_use]
    pub fn with_robot(mut self, name: &str, handle: i64, position: [f64; 3]) -> Self {
        let handle = RobotHandle(handle);
        self.handles.insert(name.to_owned(), handle);
        self.positions.insert(handle, SimPosition::from(position));
        self
    }

    /// Publish a float signal.
    #[must_use]
    pub fn with_float(mut self, name: &str, value: f64) -> Self {
        self.set_float(name, value);
        self
    }

    /// Publish a string signal.
    #[must_use]
    pub fn with_string(mut self, name: &str, value: &str) -> Self {
        self.strings.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Publish or replace a float signal.
    pub fn set_float(&mut self, name: &str, value: f64) {
        self.floats.insert(name.to_owned(), value);
    }

    /// Stop publishing a float signal.
    pub fn clear_float(&mut self, name: &str) {
        self.floats.remove(name);
    }

    /// Move an object.
    pub fn set_position(&mut self, handle: RobotHandle, position: [f64; 3]) {
        self.positions.insert(handle, SimPosition::from(position));
    }

    /// Make position reads for `handle` fail until [`heal_position`] is called.
    ///
    /// [`heal_position`]: Self::heal_position
    pub fn fail_position(&mut self, handle: RobotHandle) {
        self.failing_positions.insert(handle);
    }

    /// Undo [`fail_position`](Self::fail_position).
    pub fn heal_position(&mut self, handle: RobotHandle) {
        self.failing_positions.remove(&handle);
    }

    /// Make reads of the named signal fail.
    pub fn fail_signal(&mut self, name: &str) {
        self.failing_signals.insert(name.to_owned());
    }

    /// Every query received so far, as `op:target` strings.
    pub fn query_log(&self) -> &[String] {
        &self.log
    }

    fn signal_failure(&self, op: &'static str, name: &str) -> Result<(), ReadError> {
        if self.failing_signals.contains(name) {
            return Err(ReadError::Io {
                op,
                message: format!("scripted failure reading {name}"),
            });
        }
        Ok(())
    }
}

impl SimulationGateway for ScriptedGateway {
    async fn resolve_handle(&mut self, name: &str) -> Result<Option<RobotHandle>, ReadError> {
        self.log.push(format!("handle:{name}"));
        Ok(self.handles.get(name).copied())
    }

    async fn read_position(&mut self, handle: RobotHandle) -> Result<SimPosition, ReadError> {
        self.log.push(format!("position:{handle}"));
        if self.failing_positions.contains(&handle) {
            return Err(ReadError::Timeout {
                op: "get_object_position",
                timeout_ms: 0,
            });
        }
        self.positions
            .get(&handle)
            .copied()
            .ok_or(ReadError::UnknownObject { handle })
    }

    async fn read_float_signal(&mut self, name: &str) -> Result<Option<f64>, ReadError> {
        self.log.push(format!("float:{name}"));
        self.signal_failure("get_float_signal", name)?;
        Ok(self.floats.get(name).copied())
    }

    async fn read_string_signal(&mut self, name: &str) -> Result<Option<String>, ReadError> {
        self.log.push(format!("string:{name}"));
        self.signal_failure("get_string_signal", name)?;
        Ok(self.strings.get(name).cloned())
    }
}
