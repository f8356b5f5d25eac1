//! Backend Error Module
//!
//! This module defines the error type shared by every hub component and
//! its conversion into HTTP responses.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - HubError taxonomy, status codes, retry hints
//! └── conversion.rs - IntoResponse implementation
//! ```
//!
//! Nothing in the hub is fatal to the process. A failed WebSocket command is
//! answered with an `error` event and the connection stays open; only a
//! failed handshake closes a connection.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::HubError;
