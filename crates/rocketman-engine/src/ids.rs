//! Collision-checked rocket ID generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rocketman_core::names::{WORDS, draw_candidate};
use rocketman_db::RocketStore;
use rocketman_types::RocketId;
use tracing::debug;

use crate::error::RocketError;

/// Calls made so far, mixed into the seed so two calls within one clock
/// tick still draw different sequences.
static GENERATIONS: AtomicU64 = AtomicU64::new(0);

/// Draws `<word>-<word>` IDs until one is free across every owner.
#[derive(Clone)]
pub struct IdGenerator {
    store: RocketStore,
    words: &'static [&'static str],
}

impl IdGenerator {
    /// A generator over the built-in word list.
    pub const fn new(store: RocketStore) -> Self {
        Self::with_words(store, WORDS)
    }

    /// A generator over a custom word list.
    pub const fn with_words(store: RocketStore, words: &'static [&'static str]) -> Self {
        Self { store, words }
    }

    /// Return the first candidate that no owner is using.
    ///
    /// The random source is reseeded from the clock on every call.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::ExhaustedRetries`] after `max_retries`
    /// taken candidates, or [`RocketError::Store`] if the store cannot be
    /// checked.
    pub async fn generate(&self, max_retries: u32) -> Result<RocketId, RocketError> {
        let mut rng = StdRng::seed_from_u64(clock_seed());
        for attempt in 1..=max_retries {
            let Some(candidate) = draw_candidate(&mut rng, self.words) else {
                break;
            };
            if !self.store.exists_anywhere(&candidate).await? {
                return Ok(candidate);
            }
            debug!(rocket_id = %candidate, attempt, "rocket ID taken, drawing again");
        }
        Err(RocketError::ExhaustedRetries {
            attempts: max_retries,
        })
    }
}

fn clock_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs().rotate_left(32) ^ u64::from(d.subsec_nanos()));
    nanos ^ GENERATIONS.fetch_add(1, Ordering::Relaxed).rotate_left(48)
}
