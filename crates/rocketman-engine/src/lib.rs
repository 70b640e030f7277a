//! Event-driven core of the Rocket Manager.
//!
//! ```text
//! RocketService ──created/launched──> EventBus ──launched/updated──> UpdateHandler
//!        │                               ^  │                           │
//!        └──────abort: crashed───────────┘  └──crashed──> CrashWatcher  │
//!                                           ^                  │        │
//!                                           └────updated───────┴────────┘
//! ```
//!
//! Every component works through an [`EngineContext`] built once at
//! startup. The store holds the authoritative rocket state; events only
//! carry snapshots, and every handler re-reads the store before it writes.
//!
//! # Modules
//!
//! - [`bus`] -- Event bus client (NATS `JetStream` and in-process)
//! - [`context`] -- Shared configuration, store and bus handles
//! - [`service`] -- Owner-scoped rocket operations for the API
//! - [`update_handler`] -- The simulation loop
//! - [`crash_watcher`] -- Terminal crash transitions
//! - [`flights`] -- Per-rocket in-progress registry
//! - [`ids`] -- Collision-checked ID generation
//! - [`error`] -- [`RocketError`]

pub mod bus;
pub mod context;
pub mod crash_watcher;
pub mod error;
pub mod flights;
pub mod ids;
pub mod service;
pub mod update_handler;

pub use bus::{EventBus, MemoryBus, NatsBus};
pub use context::EngineContext;
pub use crash_watcher::CrashWatcher;
pub use error::RocketError;
pub use flights::FlightRegistry;
pub use ids::IdGenerator;
pub use service::RocketService;
pub use update_handler::UpdateHandler;
