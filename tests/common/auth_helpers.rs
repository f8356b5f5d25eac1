//! Authentication test helpers
//!
//! Tokens are signed with the same HS256 secret the fixtures configure, so
//! they pass the real `JwtVerifier`.

use uuid::Uuid;
use xfhub::backend::auth::sessions::create_token;

/// Secret shared by every fixture in the suite
pub const TEST_SECRET: &str = "hub-suite-secret";

/// Token for a user, valid for an hour
pub fn token_for(user_id: Uuid, name: &str) -> String {
    create_token(TEST_SECRET, user_id, Some(name.to_string()), 3600)
        .expect("Failed to create test token")
}

/// Token that expired well outside the validation leeway
pub fn expired_token_for(user_id: Uuid) -> String {
    create_token(TEST_SECRET, user_id, None, -3600).expect("Failed to create expired token")
}

/// Create authorization header value
pub fn auth_header(token: &str) -> String {
    format!("Bearer {}", token)
}
