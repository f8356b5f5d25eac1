//! Unread counters returned on reconnect.

use serde::{Deserialize, Serialize};

/// Point-in-time unread aggregate for one user
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadCounts {
    /// Messages from others, not read by the user, system messages excluded
    pub messages: u64,
    /// Unread notifications, friend requests excluded
    pub notifications: u64,
    /// Incoming pending friend requests
    pub pending_requests: u64,
}

impl UnreadCounts {
    pub fn total(&self) -> u64 {
        self.messages + self.notifications + self.pending_requests
    }
}
