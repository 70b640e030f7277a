//! REST endpoint handlers.
//!
//! Every rocket route is scoped to the authenticated user: a rocket owned by
//! somebody else is indistinguishable from one that does not exist.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Service name and version |
//! | `GET` | `/status` | Store and bus readiness |
//! | `POST` | `/rockets` | Create a rocket |
//! | `GET` | `/rockets` | List own rockets |
//! | `GET` | `/rockets/{id}` | Get a rocket |
//! | `PUT` | `/rockets/{id}` | Edit geometry before launch |
//! | `DELETE` | `/rockets/{id}` | Delete a rocket |
//! | `PUT` | `/rockets/{id}/launch` | Launch |
//! | `PUT` | `/rockets/{id}/abort` | Terminate a flight |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rocketman_types::{Rocket, RocketId, RocketParams};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Service name and version.
///
/// # Route
///
/// `GET /`
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "Service": state.context().config.service.name,
        "Version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness of the backing store and event bus. `503` until both are
/// reachable.
///
/// # Route
///
/// `GET /status`
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ctx = state.context();
    let store = ctx.store.is_healthy();
    let bus = ctx.bus.is_connected();
    let code = if store && bus {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(serde_json::json!({
            "ready": store && bus,
            "store": { "backend": ctx.store.name(), "reachable": store },
            "bus": { "backend": ctx.bus.name(), "reachable": bus },
        })),
    )
}

/// `POST /rockets`
pub async fn create_rocket(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
    Json(params): Json<RocketParams>,
) -> Result<Json<Rocket>, ApiError> {
    Ok(Json(state.service.create_rocket(params, &owner).await?))
}

/// `GET /rockets`
pub async fn list_rockets(
    AuthUser(owner): AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Rocket>>, ApiError> {
    Ok(Json(state.service.list_rockets(&owner).await?))
}

/// `GET /rockets/{id}`
pub async fn get_rocket(
    AuthUser(owner): AuthUser,
    Path(id): Path<RocketId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Rocket>, ApiError> {
    Ok(Json(state.service.get_rocket(&id, &owner).await?))
}

/// `PUT /rockets/{id}`
pub async fn edit_rocket(
    AuthUser(owner): AuthUser,
    Path(id): Path<RocketId>,
    State(state): State<Arc<AppState>>,
    Json(params): Json<RocketParams>,
) -> Result<Json<Rocket>, ApiError> {
    Ok(Json(state.service.edit_rocket(&id, params, &owner).await?))
}

/// `DELETE /rockets/{id}`
pub async fn delete_rocket(
    AuthUser(owner): AuthUser,
    Path(id): Path<RocketId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Rocket>, ApiError> {
    Ok(Json(state.service.delete_rocket(&id, &owner).await?))
}

/// `PUT /rockets/{id}/launch`
pub async fn launch_rocket(
    AuthUser(owner): AuthUser,
    Path(id): Path<RocketId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Rocket>, ApiError> {
    Ok(Json(state.service.launch_rocket(&id, &owner).await?))
}

/// `PUT /rockets/{id}/abort`
pub async fn abort_rocket(
    AuthUser(owner): AuthUser,
    Path(id): Path<RocketId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Rocket>, ApiError> {
    Ok(Json(state.service.abort_rocket(&id, &owner).await?))
}
