//! XFHub - Main Library
//!
//! XFHub is the real-time coordination layer of the platform. The CRUD backend,
//! the public web app and the moderation dashboard talk to it over REST and a
//! persistent WebSocket connection; the hub keeps the state that only makes
//! sense while users are connected.
//!
//! # Overview
//!
//! This library provides:
//! - Authenticated connection registry with multi-device fan-out
//! - Room routing for conversations and per-user notification channels
//! - Live-broadcast viewer presence with deduplicated counters
//! - On-demand unread counts (messages, notifications, pending requests)
//! - Race-safe friend request state transitions on the social graph
//!
//! # Module Structure
//!
//! - **`shared`** - Wire types shared with clients
//!   - Hub events, viewer identities, relationship states, unread counts
//!   - Configuration
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum WebSocket and REST endpoints
//!   - Session registry, room router, presence tracker, social graph
//!   - PostgreSQL and in-memory stores
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - Enables the backend modules and the server binary
//!
//! # Usage
//!
//! ```rust,no_run
//! use xfhub::backend::server::init::create_app;
//! use xfhub::shared::config::HubConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HubConfig::load()?;
//! let app = create_app(&config).await?;
//! // Serve `app` with axum::serve
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! - Registry and room maps are sharded `DashMap`s, no global lock
//! - Each live viewer set is owned by one async mutex (single writer per session)
//! - The relationship store is the single source of truth for the social graph

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
