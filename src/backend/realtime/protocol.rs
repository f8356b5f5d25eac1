/**
 * WebSocket Protocol
 *
 * Client frames are JSON objects with a `type` tag and an optional
 * `request_id` that the reply echoes:
 *
 * ```json
 * {"request_id": "r1", "type": "join_room", "room": "conversation:42"}
 * ```
 *
 * Every frame is answered with exactly one `ack` or `error` event. A failed
 * command never closes the connection.
 */

use serde::Deserialize;
use uuid::Uuid;

use crate::backend::error::HubError;
use crate::backend::hub::{ConnectionHandle, Hub};
use crate::shared::event::HubEvent;
use crate::shared::identity::{UserId, ViewerId};
use crate::shared::social::{
    EdgeState, FriendRequestResponse, ListFriendsResponse, RelationshipResponse,
};

/// Decoded client frame
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClientFrame {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub command: ClientCommand,
}

/// Commands a client can issue
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom { room: String },
    LeaveRoom { room: String },
    Typing { room: String, is_typing: bool },
    MarkRead { room: String, message_id: Uuid },
    GetUnread,
    JoinViewer { session_id: String },
    LeaveViewer { session_id: String },
    SendRequest { user_id: UserId },
    CancelRequest { user_id: UserId },
    AcceptRequest { user_id: UserId },
    RejectRequest { user_id: UserId },
    Unfriend { user_id: UserId },
    ListFriends,
    Relationship { user_id: UserId },
}

impl ClientCommand {
    /// Tag used in logs
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::JoinRoom { .. } => "join_room",
            ClientCommand::LeaveRoom { .. } => "leave_room",
            ClientCommand::Typing { .. } => "typing",
            ClientCommand::MarkRead { .. } => "mark_read",
            ClientCommand::GetUnread => "get_unread",
            ClientCommand::JoinViewer { .. } => "join_viewer",
            ClientCommand::LeaveViewer { .. } => "leave_viewer",
            ClientCommand::SendRequest { .. } => "send_request",
            ClientCommand::CancelRequest { .. } => "cancel_request",
            ClientCommand::AcceptRequest { .. } => "accept_request",
            ClientCommand::RejectRequest { .. } => "reject_request",
            ClientCommand::Unfriend { .. } => "unfriend",
            ClientCommand::ListFriends => "list_friends",
            ClientCommand::Relationship { .. } => "relationship",
        }
    }
}

/// Frame that failed to decode, with the request id if one was readable
#[derive(Debug)]
pub struct RejectedFrame {
    pub request_id: Option<String>,
    pub error: HubError,
}

/// Decode a text frame
pub fn parse_frame(text: &str) -> Result<ClientFrame, RejectedFrame> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| RejectedFrame {
        request_id: None,
        error: HubError::MalformedFrame(e.to_string()),
    })?;

    let request_id = value
        .get("request_id")
        .and_then(|id| id.as_str())
        .map(str::to_string);

    serde_json::from_value(value).map_err(|e| RejectedFrame {
        request_id,
        error: HubError::MalformedFrame(e.to_string()),
    })
}

/// Build the error reply for a failed command
pub fn error_reply(request_id: Option<String>, error: &HubError) -> HubEvent {
    HubEvent::error(request_id, error.code(), &error.message(), error.is_retryable())
}

/// Run one command for a connection and build its reply
pub async fn dispatch(hub: &Hub, connection: &ConnectionHandle, frame: ClientFrame) -> HubEvent {
    let ClientFrame {
        request_id,
        command,
    } = frame;
    let name = command.name();

    match execute(hub, connection, command).await {
        Ok(payload) => {
            tracing::debug!(
                connection_id = %connection.id,
                user_id = %connection.user_id,
                command = name,
                "Command completed"
            );
            HubEvent::ack(request_id, payload)
        }
        Err(error) => {
            tracing::warn!(
                connection_id = %connection.id,
                user_id = %connection.user_id,
                command = name,
                code = error.code(),
                "Command rejected: {}",
                error
            );
            error_reply(request_id, &error)
        }
    }
}

async fn execute(
    hub: &Hub,
    connection: &ConnectionHandle,
    command: ClientCommand,
) -> Result<serde_json::Value, HubError> {
    let me = connection.user_id;

    let payload = match command {
        ClientCommand::JoinRoom { room } => {
            let room = hub.join_room(connection.id, &room)?;
            serde_json::json!({ "room": room.to_string() })
        }
        ClientCommand::LeaveRoom { room } => {
            let left = hub.leave_room(connection.id, &room)?;
            serde_json::json!({ "room": room, "left": left })
        }
        ClientCommand::Typing { room, is_typing } => {
            hub.send_typing(connection.id, &room, is_typing)?;
            serde_json::json!({ "room": room, "is_typing": is_typing })
        }
        ClientCommand::MarkRead { room, message_id } => {
            let recorded = hub.mark_read(connection.id, &room, message_id).await?;
            serde_json::json!({ "message_id": message_id, "recorded": recorded })
        }
        ClientCommand::GetUnread => serde_json::to_value(hub.unread_counts(me).await?)?,
        ClientCommand::JoinViewer { session_id } => {
            let viewers = hub
                .join_viewer(&session_id, ViewerId::User(me), Some(connection.id))
                .await?;
            serde_json::json!({ "session_id": session_id, "viewers": viewers })
        }
        ClientCommand::LeaveViewer { session_id } => {
            let viewers = hub
                .leave_viewer(&session_id, ViewerId::User(me), Some(connection.id))
                .await?;
            serde_json::json!({ "session_id": session_id, "viewers": viewers })
        }
        ClientCommand::SendRequest { user_id } => {
            let outcome = hub.send_request(me, user_id).await?;
            let state = hub.relationship(me, user_id).await?;
            serde_json::to_value(FriendRequestResponse {
                user_id,
                outcome,
                state,
            })?
        }
        ClientCommand::CancelRequest { user_id } => {
            let cancelled = hub.cancel_request(me, user_id).await?;
            serde_json::json!({ "user_id": user_id, "cancelled": cancelled })
        }
        ClientCommand::AcceptRequest { user_id } => {
            hub.accept_request(me, user_id).await?;
            relationship_payload(user_id, EdgeState::Friends)?
        }
        ClientCommand::RejectRequest { user_id } => {
            hub.reject_request(me, user_id).await?;
            relationship_payload(user_id, EdgeState::None)?
        }
        ClientCommand::Unfriend { user_id } => {
            let removed = hub.unfriend(me, user_id).await?;
            serde_json::json!({ "user_id": user_id, "removed": removed })
        }
        ClientCommand::ListFriends => {
            let friends = hub.list_friends(me).await?;
            serde_json::to_value(ListFriendsResponse { friends })?
        }
        ClientCommand::Relationship { user_id } => {
            let state = hub.relationship(me, user_id).await?;
            relationship_payload(user_id, state)?
        }
    };
    Ok(payload)
}

fn relationship_payload(user_id: UserId, state: EdgeState) -> Result<serde_json::Value, HubError> {
    Ok(serde_json::to_value(RelationshipResponse { user_id, state })?)
}
