/**
 * Router Configuration
 *
 * Combines every route group into a single Axum router:
 *
 * 1. `GET /ws` - WebSocket upgrade
 * 2. `GET /health` - Liveness and connection counters
 * 3. API routes (bearer token)
 * 4. Internal routes (`x-internal-token`)
 * 5. Fallback handler (404)
 *
 * Every request is traced by `tower-http`'s `TraceLayer`.
 */

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::backend::hub::Hub;
use crate::backend::realtime::handler::ws_upgrade;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::routes::internal_routes::configure_internal_routes;
use crate::backend::server::state::AppState;

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub online_users: usize,
    pub connections: usize,
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health));

    let router = configure_api_routes(router);
    let router = configure_internal_routes(router);

    router
        .fallback(|| async { (StatusCode::NOT_FOUND, "404 Not Found") })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}

async fn health(State(hub): State<Arc<Hub>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        online_users: hub.online_users(),
        connections: hub.connection_count(),
    })
}
