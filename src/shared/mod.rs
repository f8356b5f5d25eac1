//! Shared Module
//!
//! This module contains types that are shared between the hub and its
//! clients. Everything here is serializable and platform-agnostic; events
//! and social types travel over the WebSocket and REST endpoints as JSON.

/// Connection, user and viewer identifiers
pub mod identity;

/// Events pushed to clients
pub mod event;

/// Social graph, notification and unread types
pub mod social;

/// Hub configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{ConfigError, HubConfig, HubConfigBuilder};
pub use event::{EventType, HubEvent};
pub use identity::{ConnectionId, UserId, ViewerId};
pub use social::{EdgeState, NotificationKind, UnreadCounts};
