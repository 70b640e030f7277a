//! Backend-agnostic rocket store.
//!
//! [`RocketStore`] dispatches to a concrete backend selected at startup.
//! Every backend honours the same contract:
//!
//! - rocket IDs are unique across all owners;
//! - records are only visible under their owner;
//! - `save` overwrites without a version check and never recreates a
//!   deleted record.

use rocketman_types::{Rocket, RocketId};

use crate::dragonfly::DragonflyPool;
use crate::error::DbError;
use crate::memory::MemoryStore;

/// Rocket storage backend.
#[derive(Clone)]
pub enum RocketStore {
    /// `Dragonfly` (Redis-compatible) storage.
    Dragonfly(DragonflyPool),
    /// In-process storage.
    Memory(MemoryStore),
}

impl RocketStore {
    /// Whether a rocket exists under `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend cannot be read.
    pub async fn exists(&self, owner: &str, id: &RocketId) -> Result<bool, DbError> {
        match self {
            Self::Dragonfly(pool) => pool.exists(owner, id).await,
            Self::Memory(store) => store.exists(owner, id).await,
        }
    }

    /// Whether any owner has a rocket with this ID.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend cannot be read.
    pub async fn exists_anywhere(&self, id: &RocketId) -> Result<bool, DbError> {
        match self {
            Self::Dragonfly(pool) => pool.exists_anywhere(id).await,
            Self::Memory(store) => store.exists_anywhere(id).await,
        }
    }

    /// Store a new rocket.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::AlreadyExists`] if the ID is taken.
    pub async fn create(&self, rocket: &Rocket) -> Result<(), DbError> {
        match self {
            Self::Dragonfly(pool) => pool.create(rocket).await,
            Self::Memory(store) => store.create(rocket).await,
        }
    }

    /// Overwrite an existing rocket record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the rocket was deleted.
    pub async fn save(&self, rocket: &Rocket) -> Result<(), DbError> {
        match self {
            Self::Dragonfly(pool) => pool.save(rocket).await,
            Self::Memory(store) => store.save(rocket).await,
        }
    }

    /// Read a rocket.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if absent.
    pub async fn get(&self, owner: &str, id: &RocketId) -> Result<Rocket, DbError> {
        match self {
            Self::Dragonfly(pool) => pool.get(owner, id).await,
            Self::Memory(store) => store.get(owner, id).await,
        }
    }

    /// Read a rocket, mapping absence to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] for anything other than absence.
    pub async fn find(&self, owner: &str, id: &RocketId) -> Result<Option<Rocket>, DbError> {
        match self.get(owner, id).await {
            Ok(rocket) => Ok(Some(rocket)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every rocket owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend cannot be read.
    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<Rocket>, DbError> {
        match self {
            Self::Dragonfly(pool) => pool.list_by_owner(owner).await,
            Self::Memory(store) => store.list_by_owner(owner).await,
        }
    }

    /// Remove a rocket and return the removed record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if absent.
    pub async fn delete(&self, owner: &str, id: &RocketId) -> Result<Rocket, DbError> {
        match self {
            Self::Dragonfly(pool) => pool.delete(owner, id).await,
            Self::Memory(store) => store.delete(owner, id).await,
        }
    }

    /// Whether the backend is currently reachable.
    pub fn is_healthy(&self) -> bool {
        match self {
            Self::Dragonfly(pool) => pool.is_connected(),
            Self::Memory(store) => store.is_available(),
        }
    }

    /// Release backend connections.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend fails to close cleanly.
    pub async fn shutdown(&self) -> Result<(), DbError> {
        match self {
            Self::Dragonfly(pool) => pool.shutdown().await,
            Self::Memory(_) => Ok(()),
        }
    }

    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Dragonfly(_) => "dragonfly",
            Self::Memory(_) => "memory",
        }
    }
}

impl From<DragonflyPool> for RocketStore {
    fn from(pool: DragonflyPool) -> Self {
        Self::Dragonfly(pool)
    }
}

impl From<MemoryStore> for RocketStore {
    fn from(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}
