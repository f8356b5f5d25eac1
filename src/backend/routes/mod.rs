//! Route Configuration Module
//!
//! HTTP routes of the hub, organized by caller.
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs             - Module exports and documentation
//! ├── router.rs          - Router assembly, /ws, /health, tracing layer
//! ├── api_routes.rs      - Bearer-authenticated client endpoints
//! └── internal_routes.rs - Collaborator endpoints behind x-internal-token
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use xfhub::backend::auth::JwtVerifier;
//! use xfhub::backend::hub::Hub;
//! use xfhub::backend::routes::create_router;
//! use xfhub::backend::server::AppState;
//! use xfhub::backend::store::{MemoryStore, Stores};
//! use xfhub::shared::config::HubConfig;
//!
//! let config = HubConfig::default();
//! let hub = Hub::new(
//!     Stores::from_backend(Arc::new(MemoryStore::new())),
//!     Arc::new(JwtVerifier::new(config.jwt_secret.clone())),
//!     Duration::from_secs(5),
//! );
//! let router = create_router(AppState::new(Arc::new(hub), Arc::new(config)));
//! ```

/// Main router creation
pub mod router;

/// Client API handlers
pub mod api_routes;

/// Collaborator API handlers
pub mod internal_routes;

pub use router::create_router;
