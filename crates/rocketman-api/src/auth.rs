//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued by the user service and signed with
//! `USER_SECRET`. The `sub` claim is the username every rocket operation
//! is scoped to. `exp` is checked when present.
//!
//! Browsers cannot set headers on a `WebSocket` handshake, so a `token`
//! query parameter is accepted when the `Authorization` header is absent.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Claims read from a user token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the username.
    pub sub: String,
    /// Expiration time (seconds since the epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Validates user tokens against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// A verifier for tokens signed with `secret`.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Return the username a token was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] if the token is invalid, expired
    /// or has an empty subject.
    pub fn username(&self, token: &str) -> Result<String, ApiError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;
        if data.claims.sub.trim().is_empty() {
            return Err(ApiError::Unauthorized("empty subject".to_owned()));
        }
        Ok(data.claims.sub)
    }
}

/// The authenticated username.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| query_token(parts))
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_owned()))?;
        state.verifier.username(&token).map(Self)
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim().to_owned())
}

fn query_token(parts: &Parts) -> Option<String> {
    parts
        .uri
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .map(str::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    fn token(secret: &str, sub: &str, exp: Option<u64>) -> String {
        let claims = Claims {
            sub: sub.to_owned(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn accepts_tokens_without_expiry() {
        let verifier = TokenVerifier::new("s3cret");
        assert_eq!(verifier.username(&token("s3cret", "alice", None)).unwrap(), "alice");
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let verifier = TokenVerifier::new("s3cret");
        assert!(verifier.username(&token("other", "alice", None)).is_err());
        assert!(verifier.username(&token("s3cret", "alice", Some(1))).is_err());
        assert!(verifier.username(&token("s3cret", "  ", None)).is_err());
        assert!(verifier.username("not-a-jwt").is_err());
    }

    #[test]
    fn token_sources() {
        let request = axum::http::Request::builder()
            .uri("/ws/rockets/a?foo=1&token=abc")
            .header(AUTHORIZATION, "Bearer xyz")
            .body(())
            .unwrap();
        let (parts, ()) = request.into_parts();
        assert_eq!(bearer_token(&parts).as_deref(), Some("xyz"));
        assert_eq!(query_token(&parts).as_deref(), Some("abc"));
    }
}
