//! Configuration, physics and flight state machine for the Rocket Manager.
//!
//! Everything in this crate is pure: no I/O beyond reading a config file,
//! no async. The engine crate wires these functions to the store and the
//! event bus.
//!
//! # Modules
//!
//! - [`config`] -- [`RocketConfig`](config::RocketConfig) loading from YAML
//!   and environment variables, plus geometry bounds checks.
//! - [`physics`] -- Diameter, fuel, mass, exhaust velocity, acceleration and
//!   fuel burn.
//! - [`flight`] -- Lifecycle phases, the single-tick integrator, the crash
//!   transition and tick planning.
//! - [`names`] -- Word list for human-readable rocket IDs.

pub mod config;
pub mod flight;
pub mod names;
pub mod physics;
