//! Rocket operations exposed to the API layer.
//!
//! Every operation is scoped to an owner: a rocket owned by someone else
//! is indistinguishable from one that does not exist.

use std::sync::Arc;

use rocketman_core::flight::{FLIGHT_TERMINATED, FlightPhase};
use rocketman_core::physics::initial_fuel;
use rocketman_types::{EventKind, Rocket, RocketEnvelope, RocketId, RocketParams, Topic};
use tracing::{info, warn};

use crate::context::EngineContext;
use crate::error::RocketError;
use crate::ids::IdGenerator;

/// Owner-scoped rocket CRUD, launch and abort.
#[derive(Clone)]
pub struct RocketService {
    ctx: Arc<EngineContext>,
    ids: IdGenerator,
}

impl RocketService {
    /// A service over the given context.
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        let ids = IdGenerator::new(ctx.store.clone());
        Self { ctx, ids }
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Build a rocket on the launch pad with fuel computed from its geometry.
    ///
    /// # Errors
    ///
    /// [`RocketError::Validation`] for out-of-bounds geometry,
    /// [`RocketError::ExhaustedRetries`] if no free ID was found, or a
    /// store error.
    pub async fn create_rocket(&self, params: RocketParams, owner: &str) -> Result<Rocket, RocketError> {
        self.ctx.config.bounds.check(&params)?;
        let id = self.ids.generate(self.ctx.config.engine.id_max_retries).await?;
        let fuel = initial_fuel(params.height, params.num_engines);
        let rocket = Rocket::new(id, owner, params, fuel);
        self.ctx.store.create(&rocket).await?;
        info!(rocket_id = %rocket.id, owner, fuel, "rocket created");

        if let Err(e) = self.publish(EventKind::Created, &rocket).await {
            warn!(rocket_id = %rocket.id, error = %e, "failed to publish created event");
        }
        Ok(rocket)
    }

    /// Read one of `owner`'s rockets.
    ///
    /// # Errors
    ///
    /// [`RocketError::NotFound`] if `owner` has no such rocket.
    pub async fn get_rocket(&self, id: &RocketId, owner: &str) -> Result<Rocket, RocketError> {
        self.stored(id, owner).await
    }

    /// Every rocket `owner` has.
    ///
    /// # Errors
    ///
    /// Returns a store error if the listing fails.
    pub async fn list_rockets(&self, owner: &str) -> Result<Vec<Rocket>, RocketError> {
        Ok(self.ctx.store.list_by_owner(owner).await?)
    }

    /// Change the geometry of a rocket still on the pad. Fuel is recomputed.
    ///
    /// # Errors
    ///
    /// [`RocketError::Validation`] for out-of-bounds geometry,
    /// [`RocketError::Conflict`] once the rocket has left the pad,
    /// [`RocketError::NotFound`] if absent.
    pub async fn edit_rocket(
        &self,
        id: &RocketId,
        params: RocketParams,
        owner: &str,
    ) -> Result<Rocket, RocketError> {
        self.ctx.config.bounds.check(&params)?;
        let mut rocket = self.stored(id, owner).await?;
        if rocket.launched || rocket.crashed || rocket.altitude > 0.0 {
            return Err(RocketError::Conflict(format!(
                "rocket {id} has left the launch pad and can no longer be edited"
            )));
        }
        rocket.num_engines = params.num_engines;
        rocket.height = params.height;
        rocket.fuel = initial_fuel(params.height, params.num_engines);
        self.ctx.store.save(&rocket).await?;
        info!(rocket_id = %id, owner, "rocket edited");
        Ok(rocket)
    }

    /// Remove a rocket and return its last state. A flight in progress
    /// stops at its next tick.
    ///
    /// # Errors
    ///
    /// [`RocketError::NotFound`] if absent.
    pub async fn delete_rocket(&self, id: &RocketId, owner: &str) -> Result<Rocket, RocketError> {
        routable(id)?;
        let rocket = self.ctx.store.delete(owner, id).await?;
        info!(rocket_id = %id, owner, "rocket deleted");
        Ok(rocket)
    }

    /// Launch a rocket and hand it to the simulation loop.
    ///
    /// # Errors
    ///
    /// [`RocketError::Conflict`] if already launched or crashed,
    /// [`RocketError::NotFound`] if absent, or a store or bus error. If the
    /// `launched` event cannot be published the launch is rolled back.
    pub async fn launch_rocket(&self, id: &RocketId, owner: &str) -> Result<Rocket, RocketError> {
        let mut rocket = self.stored(id, owner).await?;
        match FlightPhase::of(&rocket) {
            FlightPhase::Prelaunch => {}
            FlightPhase::Flying => {
                return Err(RocketError::Conflict(format!("rocket {id} is already flying")));
            }
            FlightPhase::Crashed => {
                return Err(RocketError::Conflict(format!("rocket {id} has crashed")));
            }
        }

        rocket.launched = true;
        self.ctx.store.save(&rocket).await?;
        if let Err(e) = self.publish(EventKind::Launched, &rocket).await {
            rocket.launched = false;
            if let Err(revert) = self.ctx.store.save(&rocket).await {
                warn!(rocket_id = %id, error = %revert, "failed to roll back launch");
            }
            return Err(e);
        }
        info!(rocket_id = %id, owner, "rocket launched");
        Ok(rocket)
    }

    /// Ask the crash watcher to terminate a flight.
    ///
    /// Returns the rocket as it was when the request was sent; the crash
    /// itself is applied asynchronously.
    ///
    /// # Errors
    ///
    /// [`RocketError::Conflict`] unless the rocket is flying,
    /// [`RocketError::NotFound`] if absent, or a bus error.
    pub async fn abort_rocket(&self, id: &RocketId, owner: &str) -> Result<Rocket, RocketError> {
        let rocket = self.stored(id, owner).await?;
        if FlightPhase::of(&rocket) != FlightPhase::Flying {
            return Err(RocketError::Conflict(format!("rocket {id} is not flying")));
        }
        let envelope = RocketEnvelope::snapshot(&rocket).with_status(FLIGHT_TERMINATED);
        self.ctx
            .bus
            .publish(&Topic::new(id.clone(), EventKind::Crashed), &envelope)
            .await?;
        info!(rocket_id = %id, owner, "flight termination requested");
        Ok(rocket)
    }

    async fn stored(&self, id: &RocketId, owner: &str) -> Result<Rocket, RocketError> {
        routable(id)?;
        Ok(self.ctx.store.get(owner, id).await?)
    }

    async fn publish(&self, kind: EventKind, rocket: &Rocket) -> Result<(), RocketError> {
        self.ctx
            .bus
            .publish(
                &Topic::new(rocket.id.clone(), kind),
                &RocketEnvelope::snapshot(rocket),
            )
            .await
    }
}

/// An ID that could never have been generated names no rocket. Checked
/// before the ID is used as a storage key or a subscription pattern.
fn routable(id: &RocketId) -> Result<(), RocketError> {
    if id.is_routable() {
        Ok(())
    } else {
        Err(RocketError::NotFound { id: id.to_string() })
    }
}
