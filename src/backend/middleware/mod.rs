//! Middleware Module
//!
//! Request extractors that authenticate REST callers before a handler runs,
//! plus the peer address used to key anonymous broadcast viewers.
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::Json;
//! use xfhub::backend::middleware::AuthUser;
//!
//! async fn whoami(AuthUser(identity): AuthUser) -> Json<String> {
//!     Json(identity.display_name)
//! }
//! ```

pub mod auth;
pub mod client_addr;

pub use auth::{AuthUser, InternalCaller, INTERNAL_TOKEN_HEADER};
pub use client_addr::ClientAddress;
