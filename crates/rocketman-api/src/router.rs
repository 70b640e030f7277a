//! Axum router construction for the rocket API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router: REST routes, the `WebSocket` relay, CORS and
/// request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/status", get(handlers::status))
        .route(
            "/rockets",
            get(handlers::list_rockets).post(handlers::create_rocket),
        )
        .route(
            "/rockets/{id}",
            get(handlers::get_rocket)
                .put(handlers::edit_rocket)
                .delete(handlers::delete_rocket),
        )
        .route("/rockets/{id}/launch", put(handlers::launch_rocket))
        .route("/rockets/{id}/abort", put(handlers::abort_rocket))
        .route("/ws/rockets/{id}", get(ws::ws_rocket))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
