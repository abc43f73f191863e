//! Configuration loading and typed config structures for the Habitat relay.
//!
//! The canonical configuration lives in `relay-config.yaml` in the working
//! directory. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every field has a default matching the single deployment scenario (a
//! local simulator on port 19999, dashboards on port 8765).

use std::path::Path;

use serde::Deserialize;

/// Smallest accepted tick interval.
pub const MIN_TICK_INTERVAL_MS: u64 = 100;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range or malformed.
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level relay configuration.
///
/// Mirrors the structure of `relay-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// Where the simulation bridge listens.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Sampling cadence.
    #[serde(default)]
    pub relay: TickConfig,

    /// Client-facing server settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Robots to track.
    #[serde(default)]
    pub robots: RobotsConfig,

    /// Signal names of the environment sensor array.
    #[serde(default)]
    pub environment: EnvironmentSignals,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `SIM_HOST` / `SIM_PORT` override `simulation.host` / `simulation.port`
    /// - `RELAY_HOST` / `RELAY_PORT` override `server.host` / `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// Does not consult the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a port override is not a valid
    /// port number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SIM_HOST") {
            self.simulation.host = val;
        }
        if let Some(val) = lookup("SIM_PORT") {
            self.simulation.port = parse_port("simulation.port", &val)?;
        }
        if let Some(val) = lookup("RELAY_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("RELAY_PORT") {
            self.server.port = parse_port("server.port", &val)?;
        }
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.tick_interval_ms < MIN_TICK_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                field: "relay.tick_interval_ms",
                message: format!(
                    "{} is below the minimum of {MIN_TICK_INTERVAL_MS}",
                    self.relay.tick_interval_ms
                ),
            });
        }
        if self.server.client_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "server.client_queue_capacity",
                message: String::from("must be at least 1"),
            });
        }
        if self.robots.names.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "robots.names",
                message: String::from("robot names must not be empty"),
            });
        }
        let signals = [
            &self.environment.o2_signal,
            &self.environment.pressure_signal,
            &self.environment.temperature_signal,
            &self.environment.radiation_signal,
        ];
        if signals.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "environment",
                message: String::from("signal names must not be empty"),
            });
        }
        Ok(())
    }
}

fn parse_port(field: &'static str, raw: &str) -> Result<u16, ConfigError> {
    raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
        field,
        message: format!("{raw:?} is not a port number: {e}"),
    })
}

/// Connection settings for the simulation bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Simulator host name or address.
    #[serde(default = "default_sim_host")]
    pub host: String,

    /// Simulator bridge port.
    #[serde(default = "default_sim_port")]
    pub port: u16,

    /// How long to wait for the initial TCP connect.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long to wait for each query round-trip.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl SimulationConfig {
    /// `host:port` form used for connecting and logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            host: default_sim_host(),
            port: default_sim_port(),
            connect_timeout_ms: default_timeout_ms(),
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Sampling cadence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickConfig {
    /// Milliseconds between tick starts.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Client-facing server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Address to bind.
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Frames buffered per client before the client is dropped as too slow.
    #[serde(default = "default_client_queue_capacity")]
    pub client_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            client_queue_capacity: default_client_queue_capacity(),
        }
    }
}

/// Robots to track, in dashboard order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RobotsConfig {
    /// Scene object names.
    #[serde(default = "default_robot_names")]
    pub names: Vec<String>,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            names: default_robot_names(),
        }
    }
}

/// Float signal names of the environment sensor array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvironmentSignals {
    /// Oxygen percentage signal.
    #[serde(default = "default_o2_signal")]
    pub o2_signal: String,

    /// Pressure signal (kPa).
    #[serde(default = "default_pressure_signal")]
    pub pressure_signal: String,

    /// Temperature signal (degrees Celsius).
    #[serde(default = "default_temperature_signal")]
    pub temperature_signal: String,

    /// Radiation signal.
    #[serde(default = "default_radiation_signal")]
    pub radiation_signal: String,
}

impl Default for EnvironmentSignals {
    fn default() -> Self {
        Self {
            o2_signal: default_o2_signal(),
            pressure_signal: default_pressure_signal(),
            temperature_signal: default_temperature_signal(),
            radiation_signal: default_radiation_signal(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_sim_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_sim_port() -> u16 {
    19_999
}

const fn default_timeout_ms() -> u64 {
    5_000
}

const fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_server_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_server_port() -> u16 {
    8_765
}

const fn default_client_queue_capacity() -> usize {
    16
}

fn default_robot_names() -> Vec<String> {
    vec![
        "SCOUT-1".to_owned(),
        "SCOUT-2".to_owned(),
        "SCOUT-3".to_owned(),
        "MAINT-1".to_owned(),
    ]
}

fn default_o2_signal() -> String {
    "O2_level".to_owned()
}

fn default_pressure_signal() -> String {
    "Pressure".to_owned()
}

fn default_temperature_signal() -> String {
    "Temperature".to_owned()
}

fn default_radiation_signal() -> String {
    "Radiation".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
