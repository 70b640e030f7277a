//! The engine context: configuration plus store and bus handles.
//!
//! Built once at startup and shared by `Arc` between the API, the
//! simulation loop and the crash watcher. Nothing in it changes after
//! construction; [`EngineContext::shutdown`] releases the connections.

use std::sync::Arc;

use rocketman_core::config::{PhysicsConfig, RocketConfig};
use rocketman_db::{DragonflyPool, RocketStore};
use tracing::{info, warn};

use crate::bus::{EventBus, NatsBus};
use crate::error::RocketError;

/// Shared handles every engine component works through.
pub struct EngineContext {
    /// Validated configuration.
    pub config: Arc<RocketConfig>,
    /// Authoritative rocket state.
    pub store: RocketStore,
    /// Event bus.
    pub bus: EventBus,
}

impl EngineContext {
    /// Assemble a context from already-connected backends.
    pub fn new(config: RocketConfig, store: RocketStore, bus: EventBus) -> Self {
        Self {
            config: Arc::new(config),
            store,
            bus,
        }
    }

    /// Connect to `Dragonfly` and NATS using the infrastructure settings.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError`] if either connection fails.
    pub async fn connect(config: RocketConfig) -> Result<Self, RocketError> {
        let infra = &config.infrastructure;
        let pool = DragonflyPool::connect(&infra.dragonfly_url).await?;
        let bus = NatsBus::connect(&infra.nats_url).await?;
        Ok(Self::new(config, pool.into(), bus.into()))
    }

    /// Physics constants shorthand.
    pub fn physics(&self) -> &PhysicsConfig {
        &self.config.physics
    }

    /// Whether both the store and the bus are reachable.
    pub fn is_ready(&self) -> bool {
        self.store.is_healthy() && self.bus.is_connected()
    }

    /// Close the bus, then the store. Both are attempted even if the first
    /// fails; the first error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RocketError`] if either backend fails to close cleanly.
    pub async fn shutdown(&self) -> Result<(), RocketError> {
        let bus = self.bus.shutdown().await;
        if let Err(e) = &bus {
            warn!(backend = self.bus.name(), error = %e, "event bus shutdown failed");
        }
        let store = self.store.shutdown().await.map_err(RocketError::from);
        if let Err(e) = &store {
            warn!(backend = self.store.name(), error = %e, "store shutdown failed");
        }
        info!("engine context shut down");
        bus.and(store)
    }
}
