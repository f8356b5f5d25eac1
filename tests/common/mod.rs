//! Common test utilities and helpers
//!
//! - Token helpers signed with the suite secret
//! - In-process hub fixture backed by `MemoryStore`
//! - Served application for REST and WebSocket tests
//! - Assertion macros and event helpers

pub mod assertions;
pub mod auth_helpers;
pub mod hub_fixture;
pub mod server;

pub use assertions::*;
pub use auth_helpers::*;
pub use hub_fixture::*;
pub use server::*;
