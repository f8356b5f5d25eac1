/**
 * Authentication Extractors
 *
 * REST callers present the same HS256 token as WebSocket clients, in an
 * `Authorization: Bearer <token>` header. Collaborator services calling the
 * `/internal` routes present the shared `x-internal-token` instead.
 *
 * - `AuthUser` - required bearer token, 401 when missing or invalid
 * - `Option<AuthUser>` - no header means anonymous; a bad header is still 401
 * - `InternalCaller` - 403 when internal routes are disabled or the token
 *   does not match
 */

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::backend::auth::AuthIdentity;
use crate::backend::error::HubError;
use crate::backend::server::state::AppState;

/// Header carrying the collaborator token on `/internal` routes
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Authenticated user resolved from a bearer token
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthIdentity);

fn bearer_token(parts: &Parts) -> Option<Result<&str, HubError>> {
    let header = parts.headers.get(AUTHORIZATION)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| HubError::auth("invalid Authorization header format"));
    Some(token)
}

async fn verify(state: &AppState, token: &str) -> Result<AuthUser, HubError> {
    let identity = state.hub.verifier().verify(token).await.map_err(|e| {
        tracing::warn!("Rejected bearer token: {}", e);
        HubError::from(e)
    })?;
    Ok(AuthUser(identity))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = HubError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| HubError::auth("missing Authorization header"))??;
        verify(state, token).await
    }
}

impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = HubError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts) {
            None => Ok(None),
            Some(token) => verify(state, token?).await.map(Some),
        }
    }
}

/// Collaborator service authenticated by the shared internal token
#[derive(Clone, Copy, Debug)]
pub struct InternalCaller;

impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = HubError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.internal_token.as_deref() else {
            return Err(HubError::Forbidden("internal routes are disabled".to_string()));
        };

        let presented = parts
            .headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());

        match presented {
            Some(token) if tokens_match(token, expected) => Ok(InternalCaller),
            _ => {
                tracing::warn!(path = %parts.uri.path(), "Rejected internal call");
                Err(HubError::Forbidden("invalid internal token".to_string()))
            }
        }
    }
}

/// Compare tokens without stopping at the first differing byte
fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && presented
            .as_bytes()
            .iter()
            .zip(expected.as_bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
