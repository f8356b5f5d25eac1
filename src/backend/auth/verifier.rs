//! Credential verification at connection handshake.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

use super::sessions::verify_token;
use crate::backend::error::HubError;
use crate::shared::identity::UserId;

/// WebSocket close code for an expired token
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
/// WebSocket close code for any other credential failure
pub const CLOSE_TOKEN_INVALID: u16 = 4002;

/// Identity resolved from a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: UserId,
    pub display_name: String,
}

/// Credential rejection
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),
}

impl AuthError {
    pub fn close_code(&self) -> u16 {
        match self {
            AuthError::Expired => CLOSE_TOKEN_EXPIRED,
            AuthError::Invalid(_) => CLOSE_TOKEN_INVALID,
        }
    }
}

impl From<AuthError> for HubError {
    fn from(err: AuthError) -> Self {
        HubError::Auth(err.to_string())
    }
}

/// Turns a bearer credential into an identity
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<AuthIdentity, AuthError>;
}

/// Verifier for HS256 session tokens
pub struct JwtVerifier {
    secret: String,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl AuthVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<AuthIdentity, AuthError> {
        if credential.is_empty() {
            return Err(AuthError::Invalid("missing token".to_string()));
        }

        let claims = verify_token(&self.secret, credential).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Invalid(e.to_string()),
        })?;

        let user_id = uuid::Uuid::parse_str(&claims.sub)
            .map_err(|e| AuthError::Invalid(format!("invalid user id in token: {}", e)))?;

        Ok(AuthIdentity {
            user_id,
            display_name: claims.display_name(),
        })
    }
}
