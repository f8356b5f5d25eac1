//! Server Module
//!
//! Builds the running server out of a `HubConfig`.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs    - Module exports and documentation
//! ├── state.rs  - AppState and FromRef implementations
//! ├── config.rs - Store backend selection, pool and migrations
//! └── init.rs   - Hub construction, sweeper, router
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use xfhub::backend::server::create_app;
//! use xfhub::shared::config::HubConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HubConfig::load()?;
//! let app = create_app(&config).await?;
//! let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

/// Application state management
pub mod state;

/// Store loading
pub mod config;

/// Server initialization
pub mod init;

pub use init::{create_app, create_app_with_stores};
pub use state::AppState;
