//! Shared type definitions for the Rocket Manager service.
//!
//! This crate is the single source of truth for the rocket record and the
//! event wire format. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`ids`] -- The [`RocketId`] identifier
//! - [`structs`] -- The [`Rocket`] record and [`RocketParams`]
//! - [`events`] -- Routing keys, event kinds and the [`RocketEnvelope`]

pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use events::{EventKind, RocketEnvelope, TOPIC_PREFIX, Topic, topic_matches};
pub use ids::RocketId;
pub use structs::{Rocket, RocketParams};
