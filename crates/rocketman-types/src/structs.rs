//! Core entity structs: the [`Rocket`] record and its creation parameters.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::RocketId;

/// Geometry requested when creating or editing a rocket.
///
/// Validated against the configured engine and height bounds before a
/// rocket is created or edited; out-of-range parameters are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RocketParams {
    /// Number of engines.
    pub num_engines: u32,
    /// Rocket height in metres.
    pub height: f64,
}

/// A user-owned rocket and its full flight state.
///
/// This is the snapshot embedded in every event envelope and the value
/// stored under `rocket:{owner}:{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Rocket {
    /// Globally unique identifier.
    pub id: RocketId,
    /// The controlling user. Part of the storage key, never mutated.
    pub owner: String,
    /// Number of engines. Frozen once launched.
    pub num_engines: u32,
    /// Height in metres. Frozen once launched.
    pub height: f64,
    /// Remaining fuel volume. Never negative.
    pub fuel: f64,
    /// Altitude in metres. Never below zero after a tick.
    #[serde(default)]
    pub altitude: f64,
    /// Vertical velocity in m/s. Negative while descending.
    #[serde(default)]
    pub velocity: f64,
    /// Highest altitude reached so far.
    #[serde(default)]
    pub max_altitude: f64,
    /// Set once when the owner launches the rocket.
    #[serde(default)]
    pub launched: bool,
    /// Set once when the rocket crashes. Terminal.
    #[serde(default)]
    pub crashed: bool,
    /// Human-readable label for terminal or warning transitions.
    #[serde(default)]
    pub status: Option<String>,
}

impl Rocket {
    /// Build a fresh, unlaunched rocket on the launch pad.
    pub fn new(id: RocketId, owner: impl Into<String>, params: RocketParams, fuel: f64) -> Self {
        Self {
            id,
            owner: owner.into(),
            num_engines: params.num_engines,
            height: params.height,
            fuel,
            altitude: 0.0,
            velocity: 0.0,
            max_altitude: 0.0,
            launched: false,
            crashed: false,
            status: None,
        }
    }

    /// Whether the rocket is airborne and still subject to physics ticks.
    pub const fn is_flying(&self) -> bool {
        self.launched && !self.crashed
    }

    /// The geometry this rocket was built with.
    pub const fn params(&self) -> RocketParams {
        RocketParams {
            num_engines: self.num_engines,
            height: self.height,
        }
    }
}
