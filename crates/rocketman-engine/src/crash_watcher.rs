//! Crash watcher: applies the terminal transition for `crashed` events.

use std::sync::Arc;

use rocketman_core::flight::crash;
use rocketman_types::{EventKind, RocketEnvelope, Topic};
use tracing::{debug, info, warn};

use crate::bus::Delivery;
use crate::context::EngineContext;
use crate::error::RocketError;
use crate::flights::FlightRegistry;

/// Durable consumer name of the crash watcher.
pub const CONSUMER: &str = "crash-check";

/// What a `crashed` delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashOutcome {
    /// The rocket moved to the crashed state.
    Crashed,
    /// The rocket had already crashed. Nothing changed.
    AlreadyCrashed,
    /// The rocket no longer exists.
    Missing,
}

/// Consumes `crashed` events.
#[derive(Clone)]
pub struct CrashWatcher {
    ctx: Arc<EngineContext>,
    flights: FlightRegistry,
}

impl CrashWatcher {
    /// A watcher sharing `flights` with the simulation loop.
    pub const fn new(ctx: Arc<EngineContext>, flights: FlightRegistry) -> Self {
        Self { ctx, flights }
    }

    /// Consume until the subscription closes.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError::Bus`] if the subscription cannot be opened.
    pub async fn run(self) -> Result<(), RocketError> {
        let patterns = [Topic::any_rocket(EventKind::Crashed)];
        let mut subscription = self.ctx.bus.subscribe(CONSUMER, &patterns).await?;
        info!(consumer = CONSUMER, "crash watcher started");

        while let Some(next) = subscription.next().await {
            match next {
                Ok(delivery) => {
                    let watcher = self.clone();
                    tokio::spawn(async move { watcher.handle(delivery).await });
                }
                Err(e) => warn!(consumer = CONSUMER, error = %e, "consumer stream error"),
            }
        }

        info!(consumer = CONSUMER, "subscription closed, crash watcher stopping");
        Ok(())
    }

    /// Process one delivery and settle it.
    pub async fn handle(&self, delivery: Delivery) {
        let outcome = match delivery.decode() {
            Ok((_, envelope)) => self.crash(&envelope).await,
            Err(e) => Err(e),
        };
        delivery.settle(&outcome).await;
    }

    /// Crash the stored rocket named in `envelope`, at most once.
    ///
    /// The envelope's `status` becomes the crash label; without one the
    /// stored status is kept. Waits for any tick in progress on the same
    /// rocket so the two never interleave.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError`] if the store or bus fails.
    pub async fn crash(&self, envelope: &RocketEnvelope) -> Result<CrashOutcome, RocketError> {
        let id = &envelope.rocket.id;
        let flight = self.flights.begin(id).await;

        let Some(mut rocket) = self.ctx.store.find(&envelope.rocket.owner, id).await? else {
            debug!(rocket_id = %id, "crashed event for a deleted rocket");
            return Ok(CrashOutcome::Missing);
        };
        if !crash(&mut rocket, envelope.status.as_deref()) {
            debug!(rocket_id = %id, "rocket already crashed");
            return Ok(CrashOutcome::AlreadyCrashed);
        }
        if let Err(e) = self.ctx.store.save(&rocket).await {
            if e.is_not_found() {
                return Ok(CrashOutcome::Missing);
            }
            return Err(e.into());
        }
        drop(flight);

        info!(
            rocket_id = %id,
            status = rocket.status.as_deref().unwrap_or_default(),
            altitude = rocket.altitude,
            "rocket crashed"
        );
        self.ctx
            .bus
            .publish(
                &Topic::new(id.clone(), EventKind::Updated),
                &RocketEnvelope::snapshot(&rocket),
            )
            .await?;
        Ok(CrashOutcome::Crashed)
    }
}
