//! Backend Module
//!
//! All server-side code of the hub. It provides the coordination core, the
//! stores it persists through, and the Axum server that exposes it over
//! WebSocket and REST.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`hub`** - Session registry, room router, presence, unread, social graph
//! - **`store`** - Store traits with PostgreSQL and in-memory backends
//! - **`auth`** - JWT verification behind the `AuthVerifier` seam
//! - **`realtime`** - WebSocket actor and wire protocol
//! - **`routes`** - REST and internal endpoints, router assembly
//! - **`middleware`** - Request extractors (bearer user, internal caller, peer address)
//! - **`server`** - Application state and initialization
//! - **`error`** - `HubError` and its HTTP mapping
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs        - Module exports and documentation
//! ├── main.rs       - Server binary
//! ├── hub/          - Coordination core
//! ├── store/        - Durable state
//! ├── auth/         - Credential verification
//! ├── realtime/     - WebSocket transport
//! ├── routes/       - HTTP routes
//! ├── middleware/   - Extractors
//! ├── server/       - State and initialization
//! └── error/        - Error types
//! ```
//!
//! # Thread Safety
//!
//! The hub is shared as `Arc<Hub>` and every method takes `&self`:
//! - `DashMap` shards for connections, rooms, memberships and typing marks
//! - One `tokio::sync::Mutex` per live session for viewer sets
//! - The relationship store serializes conflicting graph mutations
//!
//! # Error Handling
//!
//! Handlers return `Result<_, HubError>`; `HubError` implements
//! `IntoResponse`, so `?` works end to end.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Coordination core
pub mod hub;

/// Store traits and backends
pub mod store;

/// WebSocket transport
pub mod realtime;

/// Backend error types
pub mod error;

/// Credential verification
pub mod auth;

/// Request extractors
pub mod middleware;

pub use error::HubError;
pub use hub::Hub;
pub use server::create_app;
