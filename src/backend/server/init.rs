/**
 * Server Initialization
 *
 * Builds the hub from the configuration and wires it into the router.
 *
 * # Initialization Process
 *
 * 1. Load the stores (PostgreSQL or in-memory)
 * 2. Create the hub with the JWT verifier and the store timeout
 * 3. Start the stale-connection sweeper
 * 4. Create the router
 *
 * The sweeper only holds a weak reference to the hub and stops once the
 * hub is dropped.
 */

use axum::Router;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::backend::auth::JwtVerifier;
use crate::backend::hub::Hub;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::load_stores;
use crate::backend::server::state::AppState;
use crate::backend::store::{StoreError, Stores};
use crate::shared::config::HubConfig;

/// Create and configure the Axum application
pub async fn create_app(config: &HubConfig) -> Result<Router<()>, StoreError> {
    tracing::info!("Initializing XFHub server");

    let stores = load_stores(config).await?;
    Ok(create_app_with_stores(config, stores))
}

/// Create the application on top of already built stores
pub fn create_app_with_stores(config: &HubConfig, stores: Stores) -> Router<()> {
    let hub = Arc::new(Hub::new(
        stores,
        Arc::new(JwtVerifier::new(config.jwt_secret.clone())),
        config.store_timeout,
    ));

    spawn_sweeper(Arc::downgrade(&hub), config.sweep_interval, config.connection_grace);

    let app_state = AppState::new(hub, Arc::new(config.clone()));
    let app = create_router(app_state);

    tracing::info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        connection_grace_secs = config.connection_grace.as_secs(),
        "Router configured with stale-connection sweeper"
    );
    app
}

/// Periodically disconnect connections that stopped answering
fn spawn_sweeper(hub: Weak<Hub>, every: Duration, grace: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(hub) = hub.upgrade() else {
                tracing::debug!("Hub dropped, stopping sweeper");
                break;
            };
            let reaped = hub.reap_stale(grace).await;
            if reaped > 0 {
                tracing::info!(reaped, "Swept stale connections");
            }
        }
    });
}
