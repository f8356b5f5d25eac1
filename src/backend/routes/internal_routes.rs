/**
 * Internal Route Handlers
 *
 * Entry points for the services that own persistence. The CRUD backend
 * stores a message or notification first and then asks the hub to fan it
 * out; the broadcasting service ends live sessions. Every route requires
 * the `x-internal-token` header and is disabled when no internal token is
 * configured.
 *
 * # Routes
 *
 * - `POST /internal/rooms/{room}/messages` - Deliver a message to a room
 * - `POST /internal/users/{user_id}/notifications` - Push a notification
 * - `DELETE /internal/live/{session_id}` - Forget an ended broadcast's viewers
 */

use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::backend::error::HubError;
use crate::backend::hub::Hub;
use crate::backend::middleware::InternalCaller;
use crate::backend::server::state::AppState;
use crate::shared::identity::UserId;
use crate::shared::social::NotificationKind;

/// Notification pushed by a collaborator
#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub kind: NotificationKind,
    pub actor: UserId,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Configure internal routes
pub fn configure_internal_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/internal/rooms/{room}/messages", post(deliver_message))
        .route("/internal/users/{user_id}/notifications", post(notify_user))
        .route("/internal/live/{session_id}", delete(end_session))
}

/// Deliver a persisted message to every connection in a room
pub async fn deliver_message(
    State(hub): State<Arc<Hub>>,
    _caller: InternalCaller,
    Path(room): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, HubError> {
    let delivered = hub.deliver_message(&room, payload)?;
    tracing::debug!(room = %room, delivered, "Message delivered");
    Ok(Json(serde_json::json!({ "room": room, "delivered": delivered })))
}

/// Push a persisted notification to a user's devices
pub async fn notify_user(
    State(hub): State<Arc<Hub>>,
    _caller: InternalCaller,
    Path(user_id): Path<UserId>,
    Json(request): Json<NotifyRequest>,
) -> Result<Json<serde_json::Value>, HubError> {
    let delivered = hub.notify_user(user_id, request.kind, request.actor, request.body);
    tracing::debug!(user_id = %user_id, kind = request.kind.as_str(), delivered, "Notification pushed");
    Ok(Json(serde_json::json!({ "user_id": user_id, "delivered": delivered })))
}

/// Discard the viewer set of a broadcast that ended
pub async fn end_session(
    State(hub): State<Arc<Hub>>,
    _caller: InternalCaller,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, HubError> {
    let discarded = hub.end_session(&session_id).await?;
    Ok(Json(serde_json::json!({ "session_id": session_id, "discarded": discarded })))
}
