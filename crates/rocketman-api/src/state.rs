//! Shared application state for the rocket API.

use std::sync::Arc;

use rocketman_engine::{EngineContext, RocketService};

use crate::auth::TokenVerifier;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState {
    /// Owner-scoped rocket operations.
    pub service: RocketService,
    /// Bearer-token verifier.
    pub verifier: TokenVerifier,
}

impl AppState {
    /// Build the state over an engine context, verifying tokens with the
    /// configured `USER_SECRET`.
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        let verifier = TokenVerifier::new(&ctx.config.infrastructure.user_secret);
        Self {
            service: RocketService::new(ctx),
            verifier,
        }
    }

    /// The engine context behind the service.
    pub fn context(&self) -> &EngineContext {
        self.service.context()
    }
}
