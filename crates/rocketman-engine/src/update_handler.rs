//! The simulation loop: one physics tick per `launched`/`updated` delivery.
//!
//! A flight is a chain of ticks keyed by rocket ID. Each tick waits one
//! `TIME_DELTA`, re-reads the stored record, lets
//! [`plan_tick`] decide whether it may advance, integrates one step,
//! persists and publishes `updated`, which schedules the next tick. The
//! chain ends when the plan halts: the rocket was deleted, never launched,
//! or a crashed snapshot has been published.
//!
//! ```text
//! launched ──> [sleep dt] ──> re-fetch ──> plan_tick
//!                                            │
//!         ┌──────────── Advance ─────────────┤
//!         v                                  ├── Reconcile ──> publish updated (crashed), stop
//!   step, save, publish                      └── Halt ───────> stop
//!   nofuel? updated, crashed?
//!         │
//!         └──> updated ──> next tick
//! ```

use std::sync::Arc;

use rocketman_core::flight::{CRASH_LANDED, HaltReason, TickPlan, TickReport, plan_tick, step};
use rocketman_types::{EventKind, Rocket, RocketEnvelope, Topic};
use tracing::{debug, info, warn};

use crate::bus::Delivery;
use crate::context::EngineContext;
use crate::error::RocketError;
use crate::flights::FlightRegistry;

/// Durable consumer name of the simulation loop.
pub const CONSUMER: &str = "rocket-update";

/// What a single delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// One tick was applied and published.
    Advanced(TickReport),
    /// The stored rocket had crashed; its state was republished once.
    Reconciled,
    /// Nothing was done and the chain ends here.
    Halted(HaltReason),
    /// Another tick for this rocket was already running.
    Duplicate,
}

/// Consumes tick events and advances rockets.
#[derive(Clone)]
pub struct UpdateHandler {
    ctx: Arc<EngineContext>,
    flights: FlightRegistry,
}

impl UpdateHandler {
    /// A handler sharing `flights` with the crash watcher.
    pub const fn new(ctx: Arc<EngineContext>, flights: FlightRegistry) -> Self {
        Self { ctx, flights }
    }

    /// Routing patterns the handler consumes.
    pub fn patterns() -> Vec<String> {
        vec![
            Topic::any_rocket(EventKind::Launched),
            Topic::any_rocket(EventKind::Updated),
        ]
    }

    /// Consume until the subscription closes. Every delivery is handled on
    /// its own task so rockets advance independently.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the subscription cannot be opened.
    pub async fn run(self) -> Result<(), RocketError> {
        let mut subscription = self.ctx.bus.subscribe(CONSUMER, &Self::patterns()).await?;
        info!(consumer = CONSUMER, "simulation loop started");

        while let Some(next) = subscription.next().await {
            match next {
                Ok(delivery) => {
                    let handler = self.clone();
                    tokio::spawn(async move { handler.handle(delivery).await });
                }
                Err(e) => warn!(consumer = CONSUMER, error = %e, "consumer stream error"),
            }
        }

        info!(consumer = CONSUMER, "subscription closed, simulation loop stopping");
        Ok(())
    }

    /// Process one delivery and settle it.
    pub async fn handle(&self, delivery: Delivery) {
        let outcome = match delivery.decode() {
            Ok((_, envelope)) => self.tick(&envelope).await,
            Err(e) => Err(e),
        };
        delivery.settle(&outcome).await;
    }

    /// Run one tick for the rocket in `envelope`.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError`] if the store or bus fails. The tick may be
    /// retried; it never advances a crashed or deleted rocket.
    pub async fn tick(&self, envelope: &RocketEnvelope) -> Result<TickOutcome, RocketError> {
        let payload = &envelope.rocket;
        let Some(flight) = self.flights.try_begin(&payload.id) else {
            debug!(rocket_id = %payload.id, "tick already in progress, dropping duplicate");
            return Ok(TickOutcome::Duplicate);
        };

        tokio::time::sleep(self.ctx.physics().tick_interval()).await;

        let stored = self.ctx.store.find(&payload.owner, &payload.id).await?;
        let plan = plan_tick(payload, stored.as_ref());
        let Some(mut rocket) = stored else {
            debug!(rocket_id = %payload.id, "rocket deleted, flight ends");
            return Ok(TickOutcome::Halted(HaltReason::Deleted));
        };

        match plan {
            TickPlan::Halt(reason) => {
                debug!(rocket_id = %rocket.id, reason = %reason, "tick chain halted");
                Ok(TickOutcome::Halted(reason))
            }
            TickPlan::Reconcile => {
                drop(flight);
                self.publish(EventKind::Updated, &rocket, None).await?;
                debug!(rocket_id = %rocket.id, "republished crashed state");
                Ok(TickOutcome::Reconciled)
            }
            TickPlan::Advance => {
                let report = step(&mut rocket, self.ctx.physics());
                if let Err(e) = self.ctx.store.save(&rocket).await {
                    if e.is_not_found() {
                        debug!(rocket_id = %rocket.id, "rocket deleted mid-tick, flight ends");
                        return Ok(TickOutcome::Halted(HaltReason::Deleted));
                    }
                    return Err(e.into());
                }
                drop(flight);

                debug!(
                    rocket_id = %rocket.id,
                    altitude = rocket.altitude,
                    velocity = rocket.velocity,
                    fuel = rocket.fuel,
                    "tick"
                );
                if report.ran_out_of_fuel {
                    info!(rocket_id = %rocket.id, altitude = rocket.altitude, "rocket out of fuel");
                    self.publish(EventKind::NoFuel, &rocket, None).await?;
                }
                self.publish(EventKind::Updated, &rocket, None).await?;
                if report.crashed {
                    info!(
                        rocket_id = %rocket.id,
                        max_altitude = rocket.max_altitude,
                        "rocket crash landed"
                    );
                    self.publish(EventKind::Crashed, &rocket, Some(CRASH_LANDED)).await?;
                }
                Ok(TickOutcome::Advanced(report))
            }
        }
    }

    async fn publish(
        &self,
        kind: EventKind,
        rocket: &Rocket,
        status: Option<&str>,
    ) -> Result<(), RocketError> {
        let mut envelope = RocketEnvelope::snapshot(rocket);
        if let Some(status) = status {
            envelope = envelope.with_status(status);
        }
        self.ctx
            .bus
            .publish(&Topic::new(rocket.id.clone(), kind), &envelope)
            .await
    }
}
