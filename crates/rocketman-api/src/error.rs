//! Error types for the rocket API.
//!
//! [`ApiError`] converts into an Axum response with a JSON body of the form
//! `{"error": "...", "status": 404}`.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use rocketman_engine::RocketError;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing, malformed or invalid bearer token.
    #[error("could not validate credentials: {0}")]
    Unauthorized(String),

    /// A rocket operation failed.
    #[error(transparent)]
    Rocket(#[from] RocketError),
}

impl ApiError {
    /// The HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Rocket(e) => match e {
                RocketError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                RocketError::AlreadyExists { .. } | RocketError::Conflict(_) => StatusCode::CONFLICT,
                RocketError::NotFound { .. } => StatusCode::NOT_FOUND,
                RocketError::ExhaustedRetries { .. }
                | RocketError::MalformedEvent { .. }
                | RocketError::Store(_)
                | RocketError::Bus(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        if matches!(self, Self::Unauthorized(_)) {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], axum::Json(body)).into_response();
        }
        (status, axum::Json(body)).into_response()
    }
}
