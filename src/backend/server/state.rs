/**
 * Application State
 *
 * `AppState` is the router state shared by every handler: the hub itself
 * and the configuration it was built from. Both are behind `Arc`, so
 * cloning the state per request is cheap.
 *
 * # State Extraction
 *
 * `FromRef` lets handlers that only need the hub ask for it directly:
 *
 * ```rust,no_run
 * use axum::extract::State;
 * use std::sync::Arc;
 * use xfhub::backend::hub::Hub;
 *
 * async fn handler(State(hub): State<Arc<Hub>>) -> String {
 *     hub.online_users().to_string()
 * }
 * ```
 */

use axum::extract::FromRef;
use std::sync::Arc;

use crate::backend::hub::Hub;
use crate::shared::config::HubConfig;

/// Router state
#[derive(Clone)]
pub struct AppState {
    /// The coordination hub every transport talks to
    pub hub: Arc<Hub>,

    /// Configuration the server was started with
    pub config: Arc<HubConfig>,
}

impl AppState {
    pub fn new(hub: Arc<Hub>, config: Arc<HubConfig>) -> Self {
        Self { hub, config }
    }
}

impl FromRef<AppState> for Arc<Hub> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.hub.clone()
    }
}

impl FromRef<AppState> for Arc<HubConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
