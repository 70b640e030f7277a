//! End-to-end simulation tests over the in-process store and bus.
//!
//! The simulation loop and crash watcher run as real consumer tasks; time
//! is paused so whole flights finish instantly.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc
)]

use std::sync::Arc;
use std::time::Duration;

use rocketman_core::config::RocketConfig;
use rocketman_core::flight::{CRASH_LANDED, FLIGHT_TERMINATED, HaltReason};
use rocketman_db::MemoryStore;
use rocketman_engine::crash_watcher::CrashOutcome;
use rocketman_engine::update_handler::TickOutcome;
use rocketman_engine::{
    CrashWatcher, EngineContext, EventBus, FlightRegistry, MemoryBus, RocketService, UpdateHandler,
};
use rocketman_types::{EventKind, Rocket, RocketEnvelope, RocketId, RocketParams};

struct Harness {
    ctx: Arc<EngineContext>,
    store: MemoryStore,
    bus: MemoryBus,
    flights: FlightRegistry,
    service: RocketService,
}

impl Harness {
    fn new() -> Self {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        let ctx = Arc::new(EngineContext::new(
            RocketConfig::default(),
            store.clone().into(),
            EventBus::from(bus.clone()),
        ));
        Self {
            service: RocketService::new(Arc::clone(&ctx)),
            ctx,
            store,
            bus,
            flights: FlightRegistry::new(),
        }
    }

    fn update_handler(&self) -> UpdateHandler {
        UpdateHandler::new(Arc::clone(&self.ctx), self.flights.clone())
    }

    fn crash_watcher(&self) -> CrashWatcher {
        CrashWatcher::new(Arc::clone(&self.ctx), self.flights.clone())
    }

    /// Start both consumers and let them subscribe.
    async fn start(&self) {
        tokio::spawn(self.update_handler().run());
        tokio::spawn(self.crash_watcher().run());
        settle().await;
    }

    async fn stored(&self, id: &RocketId) -> Rocket {
        self.service.get_rocket(id, "alice").await.unwrap()
    }

    /// Advance time until the rocket has crashed.
    async fn fly_until_crashed(&self, id: &RocketId) -> Rocket {
        for _ in 0..100_000 {
            let rocket = self.stored(id).await;
            if rocket.crashed {
                return rocket;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        let rocket = self.stored(id).await;
        assert!(rocket.crashed, "flight never ended: {rocket:?}");
        rocket
    }

    fn events_for(&self, id: &RocketId, kind: EventKind) -> Vec<RocketEnvelope> {
        self.bus
            .published()
            .into_iter()
            .filter(|(topic, _)| &topic.rocket_id == id && topic.kind == kind)
            .map(|(_, envelope)| envelope)
            .collect()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

const SMALL: RocketParams = RocketParams {
    num_engines: 1,
    height: 50.0,
};

#[tokio::test(start_paused = true)]
async fn full_flight_runs_to_a_crash_landing_and_stops() {
    let h = Harness::new();
    h.start().await;

    let rocket = h.service.create_rocket(SMALL, "alice").await.unwrap();
    h.service.launch_rocket(&rocket.id, "alice").await.unwrap();

    let landed = h.fly_until_crashed(&rocket.id).await;
    assert_eq!(landed.altitude, 0.0);
    assert_eq!(landed.fuel, 0.0);
    assert!(landed.max_altitude > 0.0);
    assert_eq!(landed.status.as_deref(), Some(CRASH_LANDED));

    // The chain has ended: nothing more is published, however long we wait.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let published = h.bus.published().len();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.bus.published().len(), published);
    assert_eq!(h.stored(&rocket.id).await, landed);
    assert!(h.flights.is_empty());

    let updates = h.events_for(&rocket.id, EventKind::Updated);
    let mut previous = 0.0;
    for envelope in &updates {
        assert!(envelope.rocket.max_altitude >= previous);
        assert!(envelope.rocket.max_altitude >= envelope.rocket.altitude);
        previous = envelope.rocket.max_altitude;
    }
    assert!(updates.last().unwrap().rocket.crashed);
    assert_eq!(h.events_for(&rocket.id, EventKind::NoFuel).len(), 1);
    assert_eq!(h.events_for(&rocket.id, EventKind::Crashed).len(), 1);
    assert_eq!(h.bus.nak_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn abort_mid_flight_freezes_the_rocket() {
    let h = Harness::new();
    h.start().await;

    let rocket = h.service.create_rocket(SMALL, "alice").await.unwrap();
    h.service.launch_rocket(&rocket.id, "alice").await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.stored(&rocket.id).await.altitude > 0.0);

    h.service.abort_rocket(&rocket.id, "alice").await.unwrap();
    let aborted = h.fly_until_crashed(&rocket.id).await;
    assert_eq!(aborted.status.as_deref(), Some(FLIGHT_TERMINATED));
    assert!(aborted.altitude > 0.0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.stored(&rocket.id).await, aborted);
    assert!(h.flights.is_empty());
}

#[tokio::test(start_paused = true)]
async fn crash_before_tick_leaves_crash_in_place() {
    let h = Harness::new();
    let rocket = h.service.create_rocket(SMALL, "alice").await.unwrap();
    let launched = h.service.launch_rocket(&rocket.id, "alice").await.unwrap();
    let in_flight = RocketEnvelope::snapshot(&launched);

    let crash = in_flight.clone().with_status(FLIGHT_TERMINATED);
    assert_eq!(h.crash_watcher().crash(&crash).await.unwrap(), CrashOutcome::Crashed);
    let crashed = h.stored(&rocket.id).await;

    assert_eq!(
        h.update_handler().tick(&in_flight).await.unwrap(),
        TickOutcome::Reconciled
    );
    assert_eq!(h.stored(&rocket.id).await, crashed);
    assert!(crashed.crashed);
}

#[tokio::test(start_paused = true)]
async fn tick_before_crash_is_overridden_by_crash() {
    let h = Harness::new();
    let rocket = h.service.create_rocket(SMALL, "alice").await.unwrap();
    let launched = h.service.launch_rocket(&rocket.id, "alice").await.unwrap();
    let in_flight = RocketEnvelope::snapshot(&launched);

    let outcome = h.update_handler().tick(&in_flight).await.unwrap();
    assert!(matches!(outcome, TickOutcome::Advanced(_)));
    let ticked = h.stored(&rocket.id).await;

    let crash = in_flight.with_status(FLIGHT_TERMINATED);
    assert_eq!(h.crash_watcher().crash(&crash).await.unwrap(), CrashOutcome::Crashed);
    let crashed = h.stored(&rocket.id).await;
    assert!(crashed.crashed);
    assert_eq!(crashed.altitude, ticked.altitude);
    assert_eq!(crashed.fuel, ticked.fuel);

    // The tick's own follow-up now only reconciles.
    let follow_up = RocketEnvelope::snapshot(&ticked);
    assert_eq!(
        h.update_handler().tick(&follow_up).await.unwrap(),
        TickOutcome::Reconciled
    );
    assert_eq!(h.stored(&rocket.id).await, crashed);
}

#[tokio::test(start_paused = true)]
async fn concurrent_tick_and_crash_end_crashed() {
    let h = Harness::new();
    let rocket = h.service.create_rocket(SMALL, "alice").await.unwrap();
    let launched = h.service.launch_rocket(&rocket.id, "alice").await.unwrap();
    let in_flight = RocketEnvelope::snapshot(&launched);
    let crash = in_flight.clone().with_status(FLIGHT_TERMINATED);

    let handler = h.update_handler();
    let watcher = h.crash_watcher();
    let (tick, crashed) = tokio::join!(handler.tick(&in_flight), watcher.crash(&crash));
    tick.unwrap();
    assert_eq!(crashed.unwrap(), CrashOutcome::Crashed);

    let stored = h.stored(&rocket.id).await;
    assert!(stored.crashed);
    assert_eq!(stored.status.as_deref(), Some(FLIGHT_TERMINATED));
}

#[tokio::test(start_paused = true)]
async fn deleting_a_flying_rocket_ends_the_flight() {
    let h = Harness::new();
    h.start().await;

    let rocket = h.service.create_rocket(SMALL, "alice").await.unwrap();
    h.service.launch_rocket(&rocket.id, "alice").await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    h.service.delete_rocket(&rocket.id, "alice").await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    let published = h.bus.published().len();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.bus.published().len(), published);
    assert!(!h.store.exists_anywhere(&rocket.id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn store_outage_is_retried_not_dropped() {
    let h = Harness::new();
    h.start().await;

    let rocket = h.service.create_rocket(SMALL, "alice").await.unwrap();
    h.service.launch_rocket(&rocket.id, "alice").await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    h.store.set_unavailable(true);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.bus.nak_count() > 0);
    h.store.set_unavailable(false);

    let landed = h.fly_until_crashed(&rocket.id).await;
    assert_eq!(landed.status.as_deref(), Some(CRASH_LANDED));
}

#[tokio::test(start_paused = true)]
async fn malformed_events_are_acknowledged_and_skipped() {
    let h = Harness::new();
    h.start().await;

    h.ctx
        .bus
        .publish_raw("rocket.ghost.updated", b"{not json".to_vec())
        .await
        .unwrap();
    settle().await;
    assert_eq!(h.bus.ack_count(), 1);
    assert_eq!(h.bus.nak_count(), 0);

    // The consumer is still alive.
    let rocket = h.service.create_rocket(SMALL, "alice").await.unwrap();
    h.service.launch_rocket(&rocket.id, "alice").await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.stored(&rocket.id).await.altitude > 0.0);
}

#[tokio::test(start_paused = true)]
async fn unlaunched_rocket_is_not_ticked() {
    let h = Harness::new();
    let rocket = h.service.create_rocket(SMALL, "alice").await.unwrap();
    let outcome = h
        .update_handler()
        .tick(&RocketEnvelope::snapshot(&rocket))
        .await
        .unwrap();
    assert_eq!(outcome, TickOutcome::Halted(HaltReason::NotLaunched));
    assert_eq!(h.stored(&rocket.id).await, rocket);
}
