//! HTTP and `WebSocket` surface of the Rocket Manager.
//!
//! Rocket routes authenticate with an HS256 bearer token whose `sub` claim
//! names the user, then call into [`rocketman_engine::RocketService`].
//!
//! # Modules
//!
//! - [`auth`] -- Bearer-token verification and the [`AuthUser`] extractor
//! - [`handlers`] -- REST endpoints
//! - [`ws`] -- Per-rocket `WebSocket` relay
//! - [`router`] -- Route table and middleware
//! - [`server`] -- Listener lifecycle
//! - [`state`] -- Shared [`AppState`]
//! - [`error`] -- [`ApiError`] and its HTTP mapping

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use auth::{AuthUser, TokenVerifier};
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
