/**
 * Session Registry
 *
 * Tracks which live connections belong to which authenticated user. A user
 * is online exactly while at least one of their connections is registered.
 *
 * # Layout
 *
 * Two sharded maps, updated through entry guards:
 *
 * - `users` - user id to the set of that user's connection ids
 * - `connections` - connection id to its record (owner, outbound channel,
 *   activity bookkeeping)
 *
 * A user's set is created and removed under the same shard lock, so a
 * connection registering while the user's last other connection leaves can
 * never be dropped along with the emptied set.
 */

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};

use crate::shared::event::HubEvent;
use crate::shared::identity::{ConnectionId, UserId};

/// Outbound half of a connection's event channel
pub type EventSender = mpsc::UnboundedSender<HubEvent>;

/// Record kept for every live connection
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub user_id: UserId,
    /// Display name captured at handshake
    pub display_name: String,
    pub sender: EventSender,
    pub connected_at: Instant,
    pub last_seen: Instant,
    /// Signalled when the hub drops the connection from its side
    pub shutdown: Arc<Notify>,
}

/// Connection bookkeeping per user
#[derive(Debug, Default)]
pub struct SessionRegistry {
    users: DashMap<UserId, HashSet<ConnectionId>>,
    connections: DashMap<ConnectionId, ConnectionRecord>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to its user's set
    ///
    /// Registering the same connection id twice keeps the first record.
    pub fn register(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
        display_name: impl Into<String>,
        sender: EventSender,
    ) -> Arc<Notify> {
        let shutdown = match self.connections.entry(connection_id) {
            Entry::Occupied(existing) => return existing.get().shutdown.clone(),
            Entry::Vacant(slot) => {
                let now = Instant::now();
                let shutdown = Arc::new(Notify::new());
                slot.insert(ConnectionRecord {
                    user_id,
                    display_name: display_name.into(),
                    sender,
                    connected_at: now,
                    last_seen: now,
                    shutdown: shutdown.clone(),
                });
                shutdown
            }
        };

        let devices = {
            let mut set = self.users.entry(user_id).or_default();
            set.insert(connection_id);
            set.len()
        };

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            devices,
            "Connection registered"
        );
        shutdown
    }

    /// Remove a connection; the user goes offline with their last connection
    ///
    /// Returns the removed record, `None` for unknown connections.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<ConnectionRecord> {
        let (_, record) = self.connections.remove(&connection_id)?;

        if let Entry::Occupied(mut set) = self.users.entry(record.user_id) {
            set.get_mut().remove(&connection_id);
            if set.get().is_empty() {
                set.remove();
                tracing::debug!(user_id = %record.user_id, "User went offline");
            }
        }

        Some(record)
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.users.contains_key(&user_id)
    }

    /// Number of distinct online users
    pub fn online_count(&self) -> usize {
        self.users.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    pub fn user_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.connections.get(&connection_id).map(|record| record.user_id)
    }

    /// Owner and display name of a connection
    pub fn identity_of(&self, connection_id: ConnectionId) -> Option<(UserId, String)> {
        self.connections
            .get(&connection_id)
            .map(|record| (record.user_id, record.display_name.clone()))
    }

    pub fn connections_of(&self, user_id: UserId) -> Vec<ConnectionId> {
        self.users
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Queue an event on one connection; `false` if it is gone
    pub fn send_to(&self, connection_id: ConnectionId, event: HubEvent) -> bool {
        match self.connections.get(&connection_id) {
            Some(record) => record.sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Queue an event on every connection of a user
    pub fn send_to_user(&self, user_id: UserId, event: &HubEvent) -> usize {
        self.connections_of(user_id)
            .into_iter()
            .filter(|id| self.send_to(*id, event.clone()))
            .count()
    }

    /// Record activity on a connection
    pub fn touch(&self, connection_id: ConnectionId) {
        if let Some(mut record) = self.connections.get_mut(&connection_id) {
            record.last_seen = Instant::now();
        }
    }

    /// Connections silent for longer than `grace`
    pub fn stale(&self, grace: Duration) -> Vec<ConnectionId> {
        let now = Instant::now();
        self.connections
            .iter()
            .filter(|record| now.duration_since(record.last_seen) > grace)
            .map(|record| *record.key())
            .collect()
    }
}
