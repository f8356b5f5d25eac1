//! Notification Types
//!
//! Notifications are persisted by the external store; the hub only creates,
//! retracts and fans them out.

use serde::{Deserialize, Serialize};

use crate::shared::identity::UserId;

/// Kind of a user notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone sent the recipient a friend request
    FriendRequest,
    /// Someone accepted the recipient's friend request
    FriendAccepted,
    /// New message outside an open conversation
    Message,
    /// Platform notice
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::FriendRequest => "friend_request",
            NotificationKind::FriendAccepted => "friend_accepted",
            NotificationKind::Message => "message",
            NotificationKind::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "friend_request" => Some(NotificationKind::FriendRequest),
            "friend_accepted" => Some(NotificationKind::FriendAccepted),
            "message" => Some(NotificationKind::Message),
            "system" => Some(NotificationKind::System),
            _ => None,
        }
    }

    /// Relationship requests are counted separately from other notifications
    pub fn is_relationship_request(&self) -> bool {
        matches!(self, NotificationKind::FriendRequest)
    }
}

/// Notification to persist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient: UserId,
    pub actor: UserId,
    pub kind: NotificationKind,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl NewNotification {
    pub fn new(recipient: UserId, actor: UserId, kind: NotificationKind) -> Self {
        Self {
            recipient,
            actor,
            kind,
            body: serde_json::Value::Null,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }
}
