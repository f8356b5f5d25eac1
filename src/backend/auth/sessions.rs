/**
 * Session Tokens
 *
 * HS256 JWTs issued by the platform's auth service. The hub only verifies
 * them; `create_token` exists for tooling and tests.
 */

#[cfg(feature = "ssr")]
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Username shown to other users
    #[serde(default)]
    pub username: Option<String>,
    /// Email, used as display name when no username is set
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

impl Claims {
    /// Name other users see for this account
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("user-{}", self.sub.chars().take(8).collect::<String>()))
    }
}

/// Create a JWT token for a user
///
/// # Arguments
/// * `secret` - HS256 signing secret
/// * `user_id` - User ID (UUID)
/// * `username` - Display name embedded in the token
/// * `ttl_secs` - Lifetime in seconds; negative values produce expired tokens
#[cfg(feature = "ssr")]
pub fn create_token(
    secret: &str,
    user_id: uuid::Uuid,
    username: Option<String>,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        username,
        email: None,
        exp: now.saturating_add(ttl_secs).max(0) as u64,
        iat: now.max(0) as u64,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key)
}

/// Verify and decode a JWT token
#[cfg(feature = "ssr")]
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &key, &validation)?;
    Ok(token_data.claims)
}
