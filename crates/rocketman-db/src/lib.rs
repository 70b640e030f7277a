//! Rocket state store for the Rocket Manager.
//!
//! One record per rocket, keyed by owner and ID, with IDs unique across
//! all owners. The store holds the authoritative state; event payloads are
//! only snapshots of it.
//!
//! ```text
//! RocketService / simulation loop / crash watcher
//!     |
//!     +-- RocketStore
//!         |-- Dragonfly (DragonflyPool)   production
//!         +-- Memory    (MemoryStore)     tests, single process
//! ```
//!
//! # Modules
//!
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) backend
//! - [`memory`] -- In-process backend with fault injection
//! - [`store`] -- [`RocketStore`] backend dispatch
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod store;

pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use memory::MemoryStore;
pub use store::RocketStore;
