//! Identity Types
//!
//! Identifiers for users, live connections and broadcast viewers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Authenticated user identifier
pub type UserId = Uuid;

/// Identity of one transport-level link
///
/// A user with three open tabs owns three connection ids. Connection ids are
/// never persisted and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a live-broadcast viewer
///
/// Authenticated viewers are keyed by user id. Anonymous viewers fall back to
/// the caller's network address, which is a weak identity: several viewers
/// behind one NAT collapse into a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ViewerId {
    /// Viewer with a verified account
    User(UserId),
    /// Viewer identified only by network address
    Anonymous(String),
}

impl ViewerId {
    pub fn anonymous(address: impl Into<String>) -> Self {
        Self::Anonymous(address.into())
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous(_))
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }
}

impl From<UserId> for ViewerId {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id),
            Self::Anonymous(address) => write!(f, "anon:{}", address),
        }
    }
}
