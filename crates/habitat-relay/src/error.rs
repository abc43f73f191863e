//! Error types for the relay binary.
//!
//! [`RelayError`] is the top-level error type that wraps every failure that
//! can stop the process. Everything after startup is recovered in place, so
//! in practice these are all startup failures.

/// Top-level error for the relay binary.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: habitat_core::config::ConfigError,
    },

    /// The simulator could not be reached.
    #[error("simulator connection error: {source}")]
    Connection {
        /// The underlying connection error.
        #[from]
        source: habitat_core::gateway::ConnectionError,
    },

    /// Resolving robot handles failed at the protocol level.
    #[error("robot handle resolution failed: {source}")]
    Resolve {
        /// The underlying read error.
        #[from]
        source: habitat_core::gateway::ReadError,
    },

    /// The client-facing server failed to start.
    #[error("server error: {source}")]
    Server {
        /// The underlying startup error.
        #[from]
        source: habitat_hub::StartupError,
    },
}
