//! Per-rocket flight registry.
//!
//! At most one tick runs per rocket in this process. The simulation loop
//! takes a flight with [`FlightRegistry::try_begin`] and drops a delivery
//! it cannot get one for: the tick already running will publish the next
//! `updated` itself. The crash watcher waits with
//! [`FlightRegistry::begin`] so a crash is never overwritten by a tick that
//! read the record before it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rocketman_types::RocketId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = HashMap<RocketId, Arc<AsyncMutex<()>>>;

/// Tracks which rockets have a tick or crash transition in progress.
#[derive(Clone, Default)]
pub struct FlightRegistry {
    slots: Arc<Mutex<Slots>>,
}

impl FlightRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, id: &RocketId) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.lock().entry(id.clone()).or_default())
    }

    /// Drop the slot for `id` once nobody holds or waits on it.
    fn release(&self, id: &RocketId) {
        let mut slots = self.lock();
        if slots.get(id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(id);
        }
    }

    /// Claim `id` if nothing is in progress for it.
    pub fn try_begin(&self, id: &RocketId) -> Option<FlightGuard> {
        let slot = self.slot(id);
        let claimed = slot.try_lock_owned().ok();
        if claimed.is_none() {
            self.release(id);
        }
        claimed.map(|guard| FlightGuard {
            guard: Some(guard),
            id: id.clone(),
            registry: self.clone(),
        })
    }

    /// Claim `id`, waiting for whatever is in progress to finish.
    pub async fn begin(&self, id: &RocketId) -> FlightGuard {
        let guard = self.slot(id).lock_owned().await;
        FlightGuard {
            guard: Some(guard),
            id: id.clone(),
            registry: self.clone(),
        }
    }

    /// Whether something is in progress for `id`.
    pub fn is_active(&self, id: &RocketId) -> bool {
        self.lock().get(id).is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Number of rockets with a slot.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no rocket has a slot.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Exclusive claim on one rocket. Released on drop.
pub struct FlightGuard {
    guard: Option<OwnedMutexGuard<()>>,
    id: RocketId,
    registry: FlightRegistry,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry.release(&self.id);
    }
}
