//! Sampling side of the Habitat relay.
//!
//! This crate owns everything between the simulator socket and a finished
//! [`Snapshot`](habitat_types::Snapshot): querying the simulation, turning
//! raw readings into the dashboard schema, and keeping the tick cadence.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `relay-config.yaml` into
//!   strongly-typed structs.
//! - [`gateway`] -- [`SimulationGateway`] trait, read and connection errors.
//! - [`remote`] -- TCP gateway speaking the simulation bridge protocol.
//! - [`scripted`] -- In-memory gateway for tests and demos.
//! - [`provider`] -- Task and alert provider seams with placeholder impls.
//! - [`assembler`] -- Per-tick snapshot assembly and default policy.
//! - [`control`] -- Stop signal and tick counters shared across tasks.
//! - [`scheduler`] -- The fixed-cadence tick loop.
//!
//! [`SimulationGateway`]: gateway::SimulationGateway

pub mod assembler;
pub mod config;
pub mod control;
pub mod gateway;
pub mod provider;
pub mod remote;
pub mod scheduler;
pub mod scripted;
