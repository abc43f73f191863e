//! Query interface to the external simulation process.
//!
//! The relay never owns ground truth. It asks the simulator four kinds of
//! question, each a blocking request/response round-trip:
//!
//! - resolve a scene object name to a [`RobotHandle`]
//! - read an object's world position
//! - read a named float signal
//! - read a named string signal
//!
//! "No value" is a first-class answer, represented as `Ok(None)`, and is
//! distinct from a protocol failure ([`ReadError`]). The gateway never
//! substitutes defaults; that policy belongs to the
//! [`SnapshotAssembler`](crate::assembler::SnapshotAssembler).

use std::future::Future;

use habitat_types::RobotHandle;

/// Failure to establish the simulation connection.
///
/// Fatal at startup: nothing downstream can run without a simulator.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The TCP connect was refused or failed.
    #[error("could not connect to simulator at {address}: {message}")]
    Connect {
        /// `host:port` that was dialed.
        address: String,
        /// Description of the failure.
        message: String,
    },

    /// The connect did not complete in time.
    #[error("timed out after {timeout_ms}ms connecting to simulator at {address}")]
    Timeout {
        /// `host:port` that was dialed.
        address: String,
        /// The configured connect timeout.
        timeout_ms: u64,
    },
}

/// A query failed at the protocol level.
///
/// Aborts the current tick's assembly; the scheduler skips the tick and
/// carries on.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// There is no live connection and reconnecting failed.
    #[error("simulator connection unavailable: {source}")]
    Disconnected {
        /// Why the reconnect failed.
        #[from]
        source: ConnectionError,
    },

    /// Reading from or writing to the socket failed.
    #[error("I/O error during {op}: {message}")]
    Io {
        /// The query being performed.
        op: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The simulator did not answer in time.
    #[error("{op} timed out after {timeout_ms}ms")]
    Timeout {
        /// The query being performed.
        op: &'static str,
        /// The configured request timeout.
        timeout_ms: u64,
    },

    /// The simulator sent something that is not a valid response.
    #[error("protocol violation during {op}: {message}")]
    Protocol {
        /// The query being performed.
        op: &'static str,
        /// Description of the violation.
        message: String,
    },

    /// The simulator understood the query and refused it.
    #[error("simulator rejected {op}: {message}")]
    Rejected {
        /// The query being performed.
        op: &'static str,
        /// Message returned by the simulator.
        message: String,
    },

    /// The handle no longer refers to an object in the scene.
    #[error("object {handle} has no position")]
    UnknownObject {
        /// The stale handle.
        handle: RobotHandle,
    },
}

/// A position in simulation world coordinates (meters).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimPosition {
    /// World X.
    pub x: f64,
    /// World Y.
    pub y: f64,
    /// World Z.
    pub z: f64,
}

impl From<[f64; 3]> for SimPosition {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// A source of simulation readings.
///
/// Implementations hold exactly one connection and issue requests on it
/// sequentially, so every method takes `&mut self`. The returned futures are
/// `Send` so the scheduler can run on any Tokio worker.
pub trait SimulationGateway: Send {
    /// Resolve a scene object name.
    ///
    /// Returns `Ok(None)` when no object with that name exists.
    fn resolve_handle(
        &mut self,
        name: &str,
    ) -> impl Future<Output = Result<Option<RobotHandle>, ReadError>> + Send;

    /// Read an object's absolute position.
    fn read_position(
        &mut self,
        handle: RobotHandle,
    ) -> impl Future<Output = Result<SimPosition, ReadError>> + Send;

    /// Read a float signal. `Ok(None)` means nothing is currently published.
    fn read_float_signal(
        &mut self,
        name: &str,
    ) -> impl Future<Output = Result<Option<f64>, ReadError>> + Send;

    /// Read a string signal. `Ok(None)` means nothing is currently published.
    fn read_string_signal(
        &mut self,
        name: &str,
    ) -> impl Future<Output = Result<Option<String>, ReadError>> + Send;
}
