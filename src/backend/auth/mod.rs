//! Authentication Module
//!
//! Resolves the credential presented by a client into a user identity. The
//! hub does not manage accounts or issue tokens in production; it trusts
//! HS256 tokens signed with the shared `JWT_SECRET`.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs       - Module exports and documentation
//! ├── sessions.rs  - JWT claims, signing and validation
//! └── verifier.rs  - AuthVerifier seam used by the hub and the REST layer
//! ```
//!
//! # Handshake Failures
//!
//! WebSocket clients with a bad credential are upgraded and then closed:
//!
//! - `4001` - token expired
//! - `4002` - token invalid or missing

/// JWT token generation and validation
pub mod sessions;

/// Credential verification
pub mod verifier;

pub use verifier::{AuthError, AuthIdentity, AuthVerifier, JwtVerifier};
