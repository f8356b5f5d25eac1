//! Relationship Data Structure
//!
//! State of the social graph as seen from one side of a pair of users.

use serde::{Deserialize, Serialize};

use crate::shared::identity::UserId;

/// State of the edge from one user toward another
///
/// Every ordered pair (owner, peer) holds exactly one of these states. For a
/// pending request the initiator holds `Outgoing` and the recipient holds
/// `Incoming`; `Friends` is always held by both sides.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeState {
    /// No relationship
    #[default]
    None,
    /// Owner sent a request that the peer has not answered
    Outgoing,
    /// Peer sent a request that the owner has not answered
    Incoming,
    /// Confirmed on both sides
    Friends,
}

impl EdgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeState::None => "none",
            EdgeState::Outgoing => "outgoing",
            EdgeState::Incoming => "incoming",
            EdgeState::Friends => "friends",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(EdgeState::None),
            "outgoing" => Some(EdgeState::Outgoing),
            "incoming" => Some(EdgeState::Incoming),
            "friends" => Some(EdgeState::Friends),
            _ => None,
        }
    }

    /// The same edge seen from the peer's side
    pub fn mirrored(&self) -> Self {
        match self {
            EdgeState::Outgoing => EdgeState::Incoming,
            EdgeState::Incoming => EdgeState::Outgoing,
            other => *other,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EdgeState::Outgoing | EdgeState::Incoming)
    }
}

/// Outcome of a friend request as committed by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Both pending edges were created
    Created,
    /// The same request was already pending
    AlreadyPending,
    /// The users were already friends
    AlreadyFriends,
    /// The peer had already requested the sender, both sides are now friends
    MutuallyAccepted,
}

/// Payload of a relationship-changed event
///
/// Delivered on the personal channel of the affected user. `state` is the
/// recipient's own view of the edge toward `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationshipChange {
    /// The other side of the edge
    pub user_id: UserId,
    /// Recipient's edge state toward `user_id` after the change
    pub state: EdgeState,
}

/// Response for listing friends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFriendsResponse {
    pub friends: Vec<UserId>,
}

/// Response for a single relationship lookup or mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipResponse {
    pub user_id: UserId,
    pub state: EdgeState,
}

/// Response for sending a friend request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestResponse {
    pub user_id: UserId,
    pub outcome: RequestOutcome,
    /// Sender's edge state after the call
    pub state: EdgeState,
}
