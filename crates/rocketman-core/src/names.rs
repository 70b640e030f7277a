//! Word list and candidate drawing for human-readable rocket IDs.
//!
//! A candidate is two words joined by `-` (e.g. `amber-falcon`). Uniqueness
//! is not checked here; the ID generator in the engine checks each
//! candidate against the store.

use rand::Rng;
use rocketman_types::RocketId;

/// The fixed word list candidates are drawn from.
pub const WORDS: &[&str] = &[
    "amber", "apollo", "astral", "aurora", "blaze", "bolt", "comet", "condor", "cosmic",
    "crimson", "dawn", "delta", "drift", "eagle", "echo", "ember", "falcon", "flare", "frost",
    "gamma", "gemini", "glider", "halo", "harbor", "hawk", "helix", "horizon", "ion", "iris",
    "jade", "jupiter", "kestrel", "lance", "lunar", "lynx", "mars", "meteor", "nebula", "nova",
    "onyx", "orbit", "orion", "osprey", "phoenix", "photon", "pulsar", "quasar", "raven",
    "rocket", "saturn", "scarlet", "sierra", "solar", "spark", "sparrow", "star", "storm",
    "swift", "talon", "titan", "vega", "vortex", "zenith", "zephyr",
];

/// Draw one candidate ID from `words`.
///
/// Returns `None` only when `words` is empty.
pub fn draw_candidate<R: Rng + ?Sized>(rng: &mut R, words: &[&str]) -> Option<RocketId> {
    if words.is_empty() {
        return None;
    }
    let first = words.get(rng.random_range(0..words.len()))?;
    let second = words.get(rng.random_range(0..words.len()))?;
    Some(RocketId::new(format!("{first}-{second}")))
}
