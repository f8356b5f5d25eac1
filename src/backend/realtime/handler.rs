/**
 * WebSocket Upgrade Handler
 *
 * `GET /ws?token=<jwt>` always upgrades. The credential is checked by the
 * hub inside the actor, and a bad one closes the fresh socket with 4001
 * (expired) or 4002 (invalid) so browser clients can tell the two apart.
 */

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;

use super::connection::{run_connection, Heartbeat};
use crate::backend::server::state::AppState;

/// Query parameters for the WebSocket handshake
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    /// A missing token is treated as an invalid one
    #[serde(default)]
    pub token: String,
}

/// GET /ws?token=JWT
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let heartbeat = Heartbeat {
        interval: state.config.heartbeat_interval,
        timeout: state.config.heartbeat_timeout,
    };
    let hub = state.hub.clone();

    ws.on_upgrade(move |socket| run_connection(socket, hub, params.token, heartbeat))
}
