/**
 * Hub Event System
 *
 * This module defines the events the hub pushes to connected clients.
 * Events are delivered to rooms (conversations, personal channels) or
 * directly to one connection as a reply to a command.
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::identity::UserId;
use crate::shared::social::{EdgeState, NotificationKind, RelationshipChange};

/// Type of hub event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Message delivered to a room
    Message,
    /// Notification delivered to a personal channel
    Notification,
    /// Typing state changed in a room
    Typing,
    /// A member has seen a message
    ReadReceipt,
    /// Relationship state changed for the recipient
    RelationshipChanged,
    /// Successful reply to a client command
    Ack,
    /// Failed reply to a client command
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Message => "message",
            EventType::Notification => "notification",
            EventType::Typing => "typing",
            EventType::ReadReceipt => "read_receipt",
            EventType::RelationshipChanged => "relationship_changed",
            EventType::Ack => "ack",
            EventType::Error => "error",
        }
    }
}

/// Event pushed to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubEvent {
    /// Type of event
    pub event_type: EventType,
    /// Room the event was fanned out to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Event payload (JSON-serializable data)
    pub payload: serde_json::Value,
    /// Timestamp when event occurred
    pub timestamp: String,
    /// Correlation id echoed from the client command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl HubEvent {
    /// Create a new hub event
    pub fn new(event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            room: None,
            payload,
            timestamp: get_timestamp(),
            request_id: None,
        }
    }

    /// Create a message event for a room
    pub fn message(room: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(EventType::Message, payload).with_room(room)
    }

    /// Create a notification event
    pub fn notification(kind: NotificationKind, actor: UserId, body: serde_json::Value) -> Self {
        Self::new(
            EventType::Notification,
            serde_json::json!({
                "kind": kind,
                "actor": actor,
                "body": body,
            }),
        )
    }

    /// Create a typing event
    pub fn typing(
        room: impl Into<String>,
        user_id: UserId,
        display_name: &str,
        is_typing: bool,
    ) -> Self {
        Self::new(
            EventType::Typing,
            serde_json::json!({
                "user_id": user_id,
                "display_name": display_name,
                "is_typing": is_typing,
            }),
        )
        .with_room(room)
    }

    /// Create a read-receipt event
    pub fn read_receipt(room: impl Into<String>, message_id: Uuid, reader: UserId) -> Self {
        Self::new(
            EventType::ReadReceipt,
            serde_json::json!({
                "message_id": message_id,
                "reader": reader,
            }),
        )
        .with_room(room)
    }

    /// Create a relationship-changed event
    pub fn relationship_changed(peer: UserId, state: EdgeState) -> Self {
        let change = RelationshipChange { user_id: peer, state };
        Self::new(
            EventType::RelationshipChanged,
            serde_json::to_value(change).unwrap_or(serde_json::Value::Null),
        )
    }

    /// Create a successful command reply
    pub fn ack(request_id: Option<String>, payload: serde_json::Value) -> Self {
        let mut event = Self::new(EventType::Ack, payload);
        event.request_id = request_id;
        event
    }

    /// Create a failed command reply
    pub fn error(request_id: Option<String>, code: &str, message: &str, retryable: bool) -> Self {
        let mut event = Self::new(
            EventType::Error,
            serde_json::json!({
                "code": code,
                "message": message,
                "retryable": retryable,
            }),
        );
        event.request_id = request_id;
        event
    }

    /// Set the room name
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }
}

/// Get the current timestamp as an RFC3339 string
fn get_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
