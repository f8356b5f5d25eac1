/**
 * API Route Handlers
 *
 * REST mirror of the WebSocket commands for clients that only need a
 * request/response exchange. All routes take the caller from the bearer
 * token; the live viewer routes also accept anonymous callers.
 *
 * # Routes
 *
 * ## Unread
 * - `GET /api/unread` - Unread counters
 *
 * ## Friends
 * - `GET /api/friends` - Confirmed friends
 * - `GET /api/friends/{user_id}` - Caller's edge state toward a user
 * - `POST /api/friends/{user_id}/request` - Send a friend request
 * - `DELETE /api/friends/{user_id}/request` - Cancel a sent request
 * - `POST /api/friends/{user_id}/accept` - Accept a received request
 * - `POST /api/friends/{user_id}/reject` - Reject a received request
 * - `DELETE /api/friends/{user_id}` - Unfriend
 *
 * ## Live broadcasts
 * - `POST /api/live/{session_id}/join` - Count the caller as a viewer
 * - `POST /api/live/{session_id}/leave` - Stop counting the caller
 */

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::backend::error::HubError;
use crate::backend::hub::Hub;
use crate::backend::middleware::{AuthUser, ClientAddress};
use crate::backend::server::state::AppState;
use crate::shared::identity::{UserId, ViewerId};
use crate::shared::social::{
    EdgeState, FriendRequestResponse, ListFriendsResponse, RelationshipResponse, UnreadCounts,
};

/// Configure API routes
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/unread", get(get_unread))
        .route("/api/friends", get(list_friends))
        .route(
            "/api/friends/{user_id}",
            get(get_relationship).delete(unfriend),
        )
        .route(
            "/api/friends/{user_id}/request",
            post(send_request).delete(cancel_request),
        )
        .route("/api/friends/{user_id}/accept", post(accept_request))
        .route("/api/friends/{user_id}/reject", post(reject_request))
        .route("/api/live/{session_id}/join", post(join_live))
        .route("/api/live/{session_id}/leave", post(leave_live))
}

/// Get the caller's unread counters
pub async fn get_unread(
    State(hub): State<Arc<Hub>>,
    AuthUser(me): AuthUser,
) -> Result<Json<UnreadCounts>, HubError> {
    Ok(Json(hub.unread_counts(me.user_id).await?))
}

/// List confirmed friends
pub async fn list_friends(
    State(hub): State<Arc<Hub>>,
    AuthUser(me): AuthUser,
) -> Result<Json<ListFriendsResponse>, HubError> {
    let friends = hub.list_friends(me.user_id).await?;
    Ok(Json(ListFriendsResponse { friends }))
}

/// Caller's edge state toward another user
pub async fn get_relationship(
    State(hub): State<Arc<Hub>>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<RelationshipResponse>, HubError> {
    let state = hub.relationship(me.user_id, user_id).await?;
    Ok(Json(RelationshipResponse { user_id, state }))
}

/// Send a friend request
pub async fn send_request(
    State(hub): State<Arc<Hub>>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<FriendRequestResponse>, HubError> {
    let outcome = hub.send_request(me.user_id, user_id).await?;
    let state = hub.relationship(me.user_id, user_id).await?;
    Ok(Json(FriendRequestResponse {
        user_id,
        outcome,
        state,
    }))
}

/// Withdraw a request the caller sent
pub async fn cancel_request(
    State(hub): State<Arc<Hub>>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<serde_json::Value>, HubError> {
    let cancelled = hub.cancel_request(me.user_id, user_id).await?;
    Ok(Json(serde_json::json!({ "user_id": user_id, "cancelled": cancelled })))
}

/// Accept a request sent to the caller
pub async fn accept_request(
    State(hub): State<Arc<Hub>>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<RelationshipResponse>, HubError> {
    hub.accept_request(me.user_id, user_id).await?;
    Ok(Json(RelationshipResponse {
        user_id,
        state: EdgeState::Friends,
    }))
}

/// Reject a request sent to the caller
pub async fn reject_request(
    State(hub): State<Arc<Hub>>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<RelationshipResponse>, HubError> {
    hub.reject_request(me.user_id, user_id).await?;
    Ok(Json(RelationshipResponse {
        user_id,
        state: EdgeState::None,
    }))
}

/// Remove a friendship
pub async fn unfriend(
    State(hub): State<Arc<Hub>>,
    AuthUser(me): AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<serde_json::Value>, HubError> {
    let removed = hub.unfriend(me.user_id, user_id).await?;
    Ok(Json(serde_json::json!({ "user_id": user_id, "removed": removed })))
}

fn viewer_of(user: Option<AuthUser>, address: ClientAddress) -> ViewerId {
    match user {
        Some(AuthUser(identity)) => ViewerId::User(identity.user_id),
        None => ViewerId::anonymous(address.viewer_key()),
    }
}

/// Join a live broadcast as a viewer
pub async fn join_live(
    State(hub): State<Arc<Hub>>,
    user: Option<AuthUser>,
    address: ClientAddress,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, HubError> {
    let viewers = hub
        .join_viewer(&session_id, viewer_of(user, address), None)
        .await?;
    Ok(Json(serde_json::json!({ "session_id": session_id, "viewers": viewers })))
}

/// Leave a live broadcast
pub async fn leave_live(
    State(hub): State<Arc<Hub>>,
    user: Option<AuthUser>,
    address: ClientAddress,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, HubError> {
    let viewers = hub
        .leave_viewer(&session_id, viewer_of(user, address), None)
        .await?;
    Ok(Json(serde_json::json!({ "session_id": session_id, "viewers": viewers })))
}
