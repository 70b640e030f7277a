//! In-process rocket storage.
//!
//! Same contract as [`DragonflyPool`](crate::DragonflyPool): IDs are unique
//! across all owners, `save` never recreates a deleted record, and every
//! operation is atomic with respect to the others. Backs the engine and API
//! tests, which need no running `Dragonfly`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rocketman_types::{Rocket, RocketId};
use tokio::sync::RwLock;

use crate::error::DbError;

/// Records keyed by rocket ID. The owner is checked on every access.
type Records = HashMap<RocketId, Rocket>;

/// In-memory rocket store. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Records>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with [`DbError::Unavailable`]
    /// (or succeed again when `down` is `false`).
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DbError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("memory store is offline".to_owned()));
        }
        Ok(())
    }

    fn not_found(owner: &str, id: &RocketId) -> DbError {
        DbError::NotFound {
            owner: owner.to_owned(),
            id: id.to_string(),
        }
    }

    /// Whether a rocket exists under `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the store is offline.
    pub async fn exists(&self, owner: &str, id: &RocketId) -> Result<bool, DbError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records.get(id).is_some_and(|r| r.owner == owner))
    }

    /// Whether any owner has a rocket with this ID.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the store is offline.
    pub async fn exists_anywhere(&self, id: &RocketId) -> Result<bool, DbError> {
        self.check_available()?;
        Ok(self.records.read().await.contains_key(id))
    }

    /// Store a new rocket.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::AlreadyExists`] if the ID is taken by any owner.
    /// Returns [`DbError::Unavailable`] if the store is offline.
    pub async fn create(&self, rocket: &Rocket) -> Result<(), DbError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        if records.contains_key(&rocket.id) {
            return Err(DbError::AlreadyExists {
                id: rocket.id.to_string(),
            });
        }
        records.insert(rocket.id.clone(), rocket.clone());
        Ok(())
    }

    /// Overwrite an existing rocket record. Last writer wins.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the rocket was deleted.
    /// Returns [`DbError::Unavailable`] if the store is offline.
    pub async fn save(&self, rocket: &Rocket) -> Result<(), DbError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        match records.get_mut(&rocket.id) {
            Some(slot) if slot.owner == rocket.owner => {
                *slot = rocket.clone();
                Ok(())
            }
            _ => Err(Self::not_found(&rocket.owner, &rocket.id)),
        }
    }

    /// Read a rocket.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if absent.
    /// Returns [`DbError::Unavailable`] if the store is offline.
    pub async fn get(&self, owner: &str, id: &RocketId) -> Result<Rocket, DbError> {
        self.check_available()?;
        let records = self.records.read().await;
        records
            .get(id)
            .filter(|r| r.owner == owner)
            .cloned()
            .ok_or_else(|| Self::not_found(owner, id))
    }

    /// Every rocket owned by `owner`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the store is offline.
    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<Rocket>, DbError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect())
    }

    /// Remove a rocket and return the removed record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if absent.
    /// Returns [`DbError::Unavailable`] if the store is offline.
    pub async fn delete(&self, owner: &str, id: &RocketId) -> Result<Rocket, DbError> {
        self.check_available()?;
        let mut records = self.records.write().await;
        if !records.get(id).is_some_and(|r| r.owner == owner) {
            return Err(Self::not_found(owner, id));
        }
        records.remove(id).ok_or_else(|| Self::not_found(owner, id))
    }

    /// Whether the store is accepting operations.
    pub fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}
