/**
 * Store Loading
 *
 * Picks the store backend from the configuration:
 *
 * - `database_url` set: connect a PostgreSQL pool and run the migrations
 *   under `migrations/`
 * - `database_url` unset: fall back to the in-memory store with a warning;
 *   nothing survives a restart
 *
 * A configured database that cannot be reached is a startup error. A failed
 * migration is logged and startup continues, as the schema may already be
 * current.
 */

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use crate::backend::store::{MemoryStore, PgStore, StoreError, Stores};
use crate::shared::config::HubConfig;

const MAX_CONNECTIONS: u32 = 20;

/// Build the stores the hub runs against
pub async fn load_stores(config: &HubConfig) -> Result<Stores, StoreError> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set. Using the in-memory store, state is lost on restart.");
        return Ok(Stores::from_backend(Arc::new(MemoryStore::new())));
    };

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(config.store_timeout)
        .connect(database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create database connection pool: {}", e);
            StoreError::Database(e)
        })?;
    tracing::info!("Database connection pool created successfully");

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(()) => tracing::info!("Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run database migrations: {}", e);
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Ok(Stores::from_backend(Arc::new(PgStore::new(pool))))
}
