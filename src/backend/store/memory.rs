//! In-memory store
//!
//! Every operation runs inside one critical section, which gives the same
//! conditional-update guarantees as the SQL statements in `postgres`.
//! Used when no database is configured and by the test suites.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    LiveSessionStore, MessageStore, NotificationStore, RelationshipStore, StoreError,
    UnreadSource,
};
use crate::shared::identity::UserId;
use crate::shared::social::{EdgeState, NewNotification, NotificationKind, RequestOutcome};

#[derive(Debug, Clone)]
struct StoredNotification {
    recipient: UserId,
    actor: UserId,
    kind: NotificationKind,
    is_read: bool,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    conversation: String,
    sender: Option<UserId>,
    is_system: bool,
    read_by: HashSet<UserId>,
}

#[derive(Debug, Clone, Copy, Default)]
struct LiveRecord {
    is_live: bool,
    viewers: u64,
    peak: u64,
}

/// Point-in-time copy of a broadcast session row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSnapshot {
    pub is_live: bool,
    pub viewers: u64,
    pub peak_viewers: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// (owner, peer) -> state; a missing key is `EdgeState::None`
    edges: HashMap<(UserId, UserId), EdgeState>,
    notifications: Vec<StoredNotification>,
    participants: HashMap<String, HashSet<UserId>>,
    messages: HashMap<Uuid, StoredMessage>,
    live: HashMap<String, LiveRecord>,
}

impl MemoryState {
    fn edge(&self, owner: UserId, peer: UserId) -> EdgeState {
        self.edges.get(&(owner, peer)).copied().unwrap_or_default()
    }

    fn set_edge(&mut self, owner: UserId, peer: UserId, state: EdgeState) {
        if state == EdgeState::None {
            self.edges.remove(&(owner, peer));
        } else {
            self.edges.insert((owner, peer), state);
        }
    }
}

/// Store that keeps everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every store call, used to exercise store timeouts
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            latency: Some(latency),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Mark a broadcast session as live
    pub async fn start_session(&self, session: &str) {
        let mut state = self.state.lock().await;
        let record = state.live.entry(session.to_string()).or_default();
        record.is_live = true;
    }

    /// Mark a broadcast session as ended
    pub async fn finish_session(&self, session: &str) {
        let mut state = self.state.lock().await;
        if let Some(record) = state.live.get_mut(session) {
            record.is_live = false;
        }
    }

    pub async fn session_snapshot(&self, session: &str) -> Option<LiveSnapshot> {
        let state = self.state.lock().await;
        state.live.get(session).map(|record| LiveSnapshot {
            is_live: record.is_live,
            viewers: record.viewers,
            peak_viewers: record.peak,
        })
    }

    pub async fn add_participant(&self, conversation: &str, user: UserId) {
        let mut state = self.state.lock().await;
        state
            .participants
            .entry(conversation.to_string())
            .or_default()
            .insert(user);
    }

    /// Store a message; `sender: None` marks a system message
    pub async fn add_message(&self, conversation: &str, sender: Option<UserId>) -> Uuid {
        let id = Uuid::new_v4();
        let mut state = self.state.lock().await;
        state.messages.insert(
            id,
            StoredMessage {
                conversation: conversation.to_string(),
                sender,
                is_system: sender.is_none(),
                read_by: HashSet::new(),
            },
        );
        id
    }

    /// Write one side of an edge without touching its mirror
    ///
    /// Only useful to reproduce drifted rows written by other systems.
    pub async fn force_edge(&self, owner: UserId, peer: UserId, edge: EdgeState) {
        self.state.lock().await.set_edge(owner, peer, edge);
    }

    /// Unread notifications addressed to `recipient` as (actor, kind)
    pub async fn unread_notifications_of(&self, recipient: UserId) -> Vec<(UserId, NotificationKind)> {
        let state = self.state.lock().await;
        state
            .notifications
            .iter()
            .filter(|n| n.recipient == recipient && !n.is_read)
            .map(|n| (n.actor, n.kind))
            .collect()
    }

    pub async fn mark_notifications_read(&self, recipient: UserId) {
        let mut state = self.state.lock().await;
        for notification in state.notifications.iter_mut() {
            if notification.recipient == recipient {
                notification.is_read = true;
            }
        }
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn edge(&self, owner: UserId, peer: UserId) -> Result<EdgeState, StoreError> {
        self.simulate_latency().await;
        Ok(self.state.lock().await.edge(owner, peer))
    }

    async fn create_request(&self, from: UserId, to: UserId) -> Result<RequestOutcome, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let outcome = match (state.edge(from, to), state.edge(to, from)) {
            (EdgeState::Friends, _) => {
                // Repairs a one-sided friend row
                state.set_edge(to, from, EdgeState::Friends);
                RequestOutcome::AlreadyFriends
            }
            (_, EdgeState::Outgoing) | (EdgeState::Incoming, _) => {
                state.set_edge(from, to, EdgeState::Friends);
                state.set_edge(to, from, EdgeState::Friends);
                RequestOutcome::MutuallyAccepted
            }
            (EdgeState::Outgoing, EdgeState::Incoming) => RequestOutcome::AlreadyPending,
            _ => {
                state.set_edge(from, to, EdgeState::Outgoing);
                state.set_edge(to, from, EdgeState::Incoming);
                RequestOutcome::Created
            }
        };
        Ok(outcome)
    }

    async fn remove_request(&self, from: UserId, to: UserId) -> Result<bool, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let mut changed = false;
        if state.edge(to, from) == EdgeState::Incoming {
            state.set_edge(to, from, EdgeState::None);
            changed = true;
        }
        if state.edge(from, to) == EdgeState::Outgoing {
            state.set_edge(from, to, EdgeState::None);
            changed = true;
        }
        Ok(changed)
    }

    async fn accept_request(&self, by: UserId, from: UserId) -> Result<bool, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        if state.edge(by, from) != EdgeState::Incoming {
            return Ok(false);
        }
        state.set_edge(by, from, EdgeState::Friends);
        state.set_edge(from, by, EdgeState::Friends);
        Ok(true)
    }

    async fn reject_request(&self, by: UserId, from: UserId) -> Result<bool, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        if state.edge(by, from) != EdgeState::Incoming {
            return Ok(false);
        }
        state.set_edge(by, from, EdgeState::None);
        if state.edge(from, by) == EdgeState::Outgoing {
            state.set_edge(from, by, EdgeState::None);
        }
        Ok(true)
    }

    async fn remove_relationship(&self, a: UserId, b: UserId) -> Result<bool, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let forward = state.edges.remove(&(a, b)).is_some();
        let backward = state.edges.remove(&(b, a)).is_some();
        Ok(forward || backward)
    }

    async fn friend_candidates(&self, user: UserId) -> Result<Vec<UserId>, StoreError> {
        self.simulate_latency().await;
        let state = self.state.lock().await;

        let mut friends: Vec<UserId> = state
            .edges
            .iter()
            .filter(|((owner, _), edge)| *owner == user && **edge == EdgeState::Friends)
            .map(|((_, peer), _)| *peer)
            .collect();
        friends.sort();
        Ok(friends)
    }

    async fn reciprocating(
        &self,
        user: UserId,
        candidates: &[UserId],
    ) -> Result<Vec<UserId>, StoreError> {
        self.simulate_latency().await;
        let state = self.state.lock().await;

        Ok(candidates
            .iter()
            .copied()
            .filter(|candidate| state.edge(*candidate, user) == EdgeState::Friends)
            .collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_unique(&self, notification: &NewNotification) -> Result<bool, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let duplicate = state.notifications.iter().any(|existing| {
            !existing.is_read
                && existing.recipient == notification.recipient
                && existing.actor == notification.actor
                && existing.kind == notification.kind
        });
        if duplicate {
            return Ok(false);
        }

        state.notifications.push(StoredNotification {
            recipient: notification.recipient,
            actor: notification.actor,
            kind: notification.kind,
            is_read: false,
        });
        Ok(true)
    }

    async fn retract(
        &self,
        recipient: UserId,
        actor: UserId,
        kind: NotificationKind,
    ) -> Result<u64, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let before = state.notifications.len();
        state
            .notifications
            .retain(|n| !(n.recipient == recipient && n.actor == actor && n.kind == kind));
        Ok((before - state.notifications.len()) as u64)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn mark_read(
        &self,
        conversation: &str,
        message_id: Uuid,
        reader: UserId,
    ) -> Result<bool, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let participates = state
            .participants
            .get(conversation)
            .is_some_and(|members| members.contains(&reader));
        if !participates {
            return Ok(false);
        }

        match state.messages.get_mut(&message_id) {
            Some(message) if message.conversation == conversation => {
                message.read_by.insert(reader);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UnreadSource for MemoryStore {
    async fn unread_messages(&self, user: UserId) -> Result<u64, StoreError> {
        self.simulate_latency().await;
        let state = self.state.lock().await;

        let count = state
            .messages
            .values()
            .filter(|m| !m.is_system)
            .filter(|m| m.sender != Some(user))
            .filter(|m| !m.read_by.contains(&user))
            .filter(|m| {
                state
                    .participants
                    .get(&m.conversation)
                    .is_some_and(|members| members.contains(&user))
            })
            .count();
        Ok(count as u64)
    }

    async fn unread_notifications(&self, user: UserId) -> Result<u64, StoreError> {
        self.simulate_latency().await;
        let state = self.state.lock().await;

        let count = state
            .notifications
            .iter()
            .filter(|n| n.recipient == user && !n.is_read && !n.kind.is_relationship_request())
            .count();
        Ok(count as u64)
    }

    async fn pending_requests(&self, user: UserId) -> Result<u64, StoreError> {
        self.simulate_latency().await;
        let state = self.state.lock().await;

        let count = state
            .edges
            .iter()
            .filter(|((owner, _), edge)| *owner == user && **edge == EdgeState::Incoming)
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl LiveSessionStore for MemoryStore {
    async fn increment_viewers(&self, session: &str) -> Result<Option<u64>, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        match state.live.get_mut(session) {
            Some(record) if record.is_live => {
                record.viewers += 1;
                Ok(Some(record.viewers))
            }
            _ => Ok(None),
        }
    }

    async fn decrement_viewers(&self, session: &str) -> Result<u64, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        Ok(state
            .live
            .get_mut(session)
            .map(|record| {
                record.viewers = record.viewers.saturating_sub(1);
                record.viewers
            })
            .unwrap_or(0))
    }

    async fn viewer_count(&self, session: &str) -> Result<u64, StoreError> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        Ok(state.live.get(session).map(|record| record.viewers).unwrap_or(0))
    }

    async fn raise_peak(&self, session: &str, viewers: u64) -> Result<(), StoreError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        if let Some(record) = state.live.get_mut(session) {
            record.peak = record.peak.max(viewers);
        }
        Ok(())
    }
}
