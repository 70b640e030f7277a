//! The rocket flight state machine.
//!
//! ```text
//! PRELAUNCH --launch--> FLYING --crash--> CRASHED
//! ```
//!
//! Launch is applied by the rocket service. Everything after that happens
//! here: [`plan_tick`] decides whether a delivered event may advance the
//! rocket, [`step`] integrates one tick, and [`crash`] is the single
//! terminal transition used by both the simulation loop and the crash
//! watcher.

use rocketman_types::Rocket;

use crate::config::PhysicsConfig;
use crate::physics::{acceleration, fuel_burn};

/// Status set when the last fuel is burned.
pub const OUT_OF_FUEL: &str = "Out of fuel";

/// Status set when an unpowered rocket reaches the ground.
pub const CRASH_LANDED: &str = "Crash landed";

/// Status used when the owner aborts a flight.
pub const FLIGHT_TERMINATED: &str = "Flight terminated";

/// Lifecycle phase derived from a rocket's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPhase {
    /// Built, editable, not yet launched.
    Prelaunch,
    /// Launched and receiving physics ticks.
    Flying,
    /// Terminal.
    Crashed,
}

impl FlightPhase {
    /// The phase `rocket` is in.
    pub const fn of(rocket: &Rocket) -> Self {
        if rocket.crashed {
            Self::Crashed
        } else if rocket.launched {
            Self::Flying
        } else {
            Self::Prelaunch
        }
    }
}

/// Move a rocket to the terminal crashed state.
///
/// `status` replaces the current status when given; otherwise the current
/// status is kept. Returns `false` without touching the rocket if it had
/// already crashed, so applying it twice equals applying it once.
pub fn crash(rocket: &mut Rocket, status: Option<&str>) -> bool {
    if rocket.crashed {
        return false;
    }
    rocket.crashed = true;
    if let Some(status) = status {
        rocket.status = Some(status.to_owned());
    }
    true
}

/// What happened during one [`step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The rocket burned its last fuel this tick.
    pub ran_out_of_fuel: bool,
    /// The rocket crashed this tick.
    pub crashed: bool,
}

/// Advance a flying rocket by one tick of `physics.time_delta` seconds.
///
/// A crashed rocket is left untouched.
pub fn step(rocket: &mut Rocket, physics: &PhysicsConfig) -> TickReport {
    let mut report = TickReport::default();
    if rocket.crashed {
        return report;
    }

    let dt = physics.time_delta;
    let acc = acceleration(rocket, physics);
    rocket.altitude += 0.5 * acc * dt * dt + rocket.velocity * dt;
    rocket.velocity += acc * dt;

    if rocket.fuel > 0.0 {
        rocket.fuel -= fuel_burn(rocket.num_engines, dt, physics);
        if rocket.fuel <= 0.0 {
            rocket.fuel = 0.0;
            rocket.status = Some(OUT_OF_FUEL.to_owned());
            report.ran_out_of_fuel = true;
        }
    }

    rocket.max_altitude = rocket.max_altitude.max(rocket.altitude);

    if rocket.fuel <= 0.0 && rocket.altitude <= 0.0 {
        report.crashed = crash(rocket, Some(CRASH_LANDED));
        rocket.altitude = 0.0;
    }

    report
}

/// Why a delivered tick event must not advance the rocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The rocket no longer exists in the store.
    Deleted,
    /// The stored rocket has not been launched.
    NotLaunched,
    /// The event already reported the crash; the chain ends here.
    AlreadyCrashed,
}

impl core::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Deleted => "deleted",
            Self::NotLaunched => "not launched",
            Self::AlreadyCrashed => "already crashed",
        })
    }
}

/// What to do with a `launched`/`updated` delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    /// Run one tick on the stored record and publish the result.
    Advance,
    /// The rocket crashed behind the sender's back: publish the stored
    /// record once so clients catch up, and do not tick.
    Reconcile,
    /// Do nothing.
    Halt(HaltReason),
}

/// Decide how to handle a tick event.
///
/// `payload` is the snapshot carried by the event, `stored` the
/// authoritative record re-read from the store. Only the stored record is
/// ever advanced. Every crashed outcome ends the chain: `Reconcile`
/// publishes a crashed snapshot, and a crashed snapshot arriving back here
/// halts.
pub fn plan_tick(payload: &Rocket, stored: Option<&Rocket>) -> TickPlan {
    let Some(stored) = stored else {
        return TickPlan::Halt(HaltReason::Deleted);
    };
    match FlightPhase::of(stored) {
        FlightPhase::Crashed if payload.crashed => TickPlan::Halt(HaltReason::AlreadyCrashed),
        FlightPhase::Crashed => TickPlan::Reconcile,
        FlightPhase::Prelaunch => TickPlan::Halt(HaltReason::NotLaunched),
        FlightPhase::Flying => TickPlan::Advance,
    }
}
