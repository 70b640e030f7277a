//! Rocket physics.
//!
//! Pure, deterministic functions over a rocket's geometry and flight state.
//! Units are SI throughout: metres, kilograms, seconds. Fuel is a volume;
//! [`PhysicsConfig::rf_density`] converts it to mass.

use std::f64::consts::PI;

use rocketman_types::Rocket;

use crate::config::PhysicsConfig;

/// Standard gravity (m/s^2).
pub const GRAVITY: f64 = 9.81;

/// Dry mass of a single engine (kg).
pub const ENGINE_MASS: f64 = 8400.0;

/// Density of the hull material (kg/m^3).
pub const HULL_DENSITY: f64 = 2700.0;

/// Altitude above which exhaust velocity stops improving (m).
pub const VACUUM_ALTITUDE: f64 = 170_000.0;

/// Exhaust velocity at and above [`VACUUM_ALTITUDE`] (m/s).
pub const VACUUM_EXHAUST_VELOCITY: f64 = 4130.0;

/// Body diameter for a given engine count.
///
/// A single engine gets a narrow 2.5 m body; otherwise engines are packed
/// two abreast at 4 m per pair.
pub fn diameter(num_engines: u32) -> f64 {
    if num_engines == 1 {
        return 2.5;
    }
    (f64::from(num_engines) / 2.0) * 4.0
}

/// Fuel volume a freshly built rocket is filled with.
pub fn initial_fuel(height: f64, num_engines: u32) -> f64 {
    let radius = 0.5 * diameter(num_engines);
    0.25 * height * PI * radius * radius
}

/// Total mass: propellant, engines and hull.
pub fn mass(rocket: &Rocket, physics: &PhysicsConfig) -> f64 {
    let fuel = rocket.fuel * physics.rf_density;
    let engines = ENGINE_MASS * f64::from(rocket.num_engines);
    let dia = diameter(rocket.num_engines);
    let hull = PI
        * rocket.height
        * physics.wall_thickness
        * (dia - physics.wall_thickness)
        * HULL_DENSITY;
    fuel + engines + hull
}

/// Engine exhaust velocity at `altitude`.
///
/// Ramps linearly with thinning atmosphere, then holds at the vacuum value.
pub fn exhaust_velocity(altitude: f64) -> f64 {
    if altitude < VACUUM_ALTITUDE {
        (altitude * 9.118e-6 + 2.58) * 1000.0
    } else {
        VACUUM_EXHAUST_VELOCITY
    }
}

/// Net vertical acceleration.
///
/// With no fuel the rocket is in free fall. Under power the result is
/// floored at zero: a rocket that cannot overcome gravity sits still rather
/// than oscillating around equilibrium.
pub fn acceleration(rocket: &Rocket, physics: &PhysicsConfig) -> f64 {
    if rocket.fuel <= 0.0 {
        return -GRAVITY;
    }
    let thrust = exhaust_velocity(rocket.altitude)
        * physics.mass_flow
        * f64::from(rocket.num_engines);
    (thrust / mass(rocket, physics) - GRAVITY).max(0.0)
}

/// Fuel volume burned by `num_engines` over `dt` seconds.
pub fn fuel_burn(num_engines: u32, dt: f64, physics: &PhysicsConfig) -> f64 {
    (physics.mass_flow * f64::from(num_engines) * dt) / physics.rf_density
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use rocketman_types::{RocketId, RocketParams};

    use super::*;
    use crate::config::BoundsConfig;

    fn rocket(num_engines: u32, height: f64) -> Rocket {
        Rocket::new(
            RocketId::new("test-rocket"),
            "test",
            RocketParams {
                num_engines,
                height,
            },
            initial_fuel(height, num_engines),
        )
    }

    #[test]
    fn diameter_table() {
        assert_eq!(diameter(1), 2.5);
        assert_eq!(diameter(2), 4.0);
        assert_eq!(diameter(3), 6.0);
        assert_eq!(diameter(4), 8.0);
    }

    #[test]
    fn diameter_positive_across_bounds() {
        let bounds = BoundsConfig::default();
        for n in bounds.min_engines..=bounds.max_engines {
            assert!(diameter(n) > 0.0, "diameter({n}) should be positive");
        }
    }

    #[test]
    fn initial_fuel_positive_across_bounds() {
        let bounds = BoundsConfig::default();
        let mut height = bounds.min_height;
        while height <= bounds.max_height {
            for n in bounds.min_engines..=bounds.max_engines {
                assert!(initial_fuel(height, n) > 0.0, "fuel({height}, {n})");
            }
            height += 25.0;
        }
    }

    #[test]
    fn initial_fuel_formula() {
        // 4 engines: diameter 8, radius 4.
        let expected = 0.25 * 200.0 * PI * 16.0;
        assert!((initial_fuel(200.0, 4) - expected).abs() < 1e-9);
    }

    #[test]
    fn mass_positive_with_and_without_fuel() {
        let physics = PhysicsConfig::default();
        let full = rocket(4, 200.0);
        assert!(mass(&full, &physics) > 0.0);

        let mut empty = full.clone();
        empty.fuel = 0.0;
        assert!(mass(&empty, &physics) > 0.0);
        assert!(mass(&empty, &physics) < mass(&full, &physics));
    }

    #[test]
    fn exhaust_velocity_ramps_then_holds() {
        assert!((exhaust_velocity(0.0) - 2580.0).abs() < 1e-9);
        assert!(exhaust_velocity(100_000.0) > exhaust_velocity(50_000.0));
        assert_eq!(exhaust_velocity(VACUUM_ALTITUDE), VACUUM_EXHAUST_VELOCITY);
        assert_eq!(exhaust_velocity(1.0e7), VACUUM_EXHAUST_VELOCITY);
    }

    #[test]
    fn free_fall_without_fuel() {
        let physics = PhysicsConfig::default();
        let mut r = rocket(2, 100.0);
        r.fuel = 0.0;
        assert_eq!(acceleration(&r, &physics), -GRAVITY);
    }

    #[test]
    fn powered_acceleration_never_negative() {
        // Thrust far too weak to lift: clamped to zero, not negative.
        let physics = PhysicsConfig {
            mass_flow: 1.0,
            ..PhysicsConfig::default()
        };
        let r = rocket(8, 600.0);
        assert_eq!(acceleration(&r, &physics), 0.0);
    }

    #[test]
    fn default_constants_lift_off() {
        let physics = PhysicsConfig::default();
        assert!(acceleration(&rocket(1, 50.0), &physics) > 0.0);
        assert!(acceleration(&rocket(4, 200.0), &physics) > 0.0);
    }

    #[test]
    fn fuel_burn_formula() {
        let physics = PhysicsConfig::default();
        let burn = fuel_burn(4, 0.5, &physics);
        assert!((burn - (2500.0 * 4.0 * 0.5) / 820.0).abs() < 1e-9);
        assert_eq!(fuel_burn(4, 0.0, &physics), 0.0);
    }
}
