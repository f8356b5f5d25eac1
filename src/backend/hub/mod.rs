//! Hub Module
//!
//! The real-time coordination core. `Hub` composes the components below into
//! one transport-agnostic interface used by the WebSocket actor and the REST
//! handlers.
//!
//! # Components
//!
//! - **`registry`** - `SessionRegistry`, connections per user
//! - **`rooms`** - `RoomRouter`, fan-out groups and typing state
//! - **`presence`** - `PresenceTracker`, deduplicated broadcast viewers
//! - **`unread`** - `UnreadAggregator`, counters shown on reconnect
//! - **`graph`** - `SocialGraph`, friend-request transitions
//!
//! # Connection Lifecycle
//!
//! 1. `connect` verifies the credential, registers the connection and joins
//!    it to the user's personal room before returning
//! 2. Commands run against the components, each one independently
//! 3. `disconnect` clears typing marks, room memberships, viewer sessions
//!    held only by this connection, and finally signals the transport
//!
//! `disconnect` is unconditional and repeated calls are no-ops, so the
//! actor, the heartbeat and the stale-connection sweeper may all call it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use xfhub::backend::auth::JwtVerifier;
//! use xfhub::backend::hub::Hub;
//! use xfhub::backend::store::{MemoryStore, Stores};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
//! let hub = Hub::new(stores, Arc::new(JwtVerifier::new("secret")), Duration::from_secs(5));
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let handle = hub.connect("<jwt>", tx).await?;
//! hub.join_room(handle.id, "conversation:42")?;
//! # Ok(())
//! # }
//! ```

pub mod graph;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod unread;

use dashmap::DashMap;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::backend::auth::{AuthError, AuthIdentity, AuthVerifier};
use crate::backend::error::HubError;
use crate::backend::store::{MessageStore, StoreError, Stores};
use crate::shared::event::HubEvent;
use crate::shared::identity::{ConnectionId, UserId, ViewerId};
use crate::shared::social::{EdgeState, NotificationKind, RequestOutcome, UnreadCounts};

pub use graph::SocialGraph;
pub use presence::{PresenceTracker, SessionId};
pub use registry::{EventSender, SessionRegistry};
pub use rooms::{RoomName, RoomRouter};
pub use unread::UnreadAggregator;

/// Run a store call under the store timeout
pub(crate) async fn bounded<T, F>(op: &'static str, limit: Duration, call: F) -> Result<T, HubError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!(op, "Store call failed: {}", e);
            Err(HubError::Store(e))
        }
        Err(_) => {
            tracing::warn!(op, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(HubError::StoreTimeout(op))
        }
    }
}

/// A registered connection as seen by its transport
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub display_name: String,
    /// Notified when the hub disconnects this connection
    pub shutdown: Arc<Notify>,
}

/// Real-time coordination hub
pub struct Hub {
    registry: Arc<SessionRegistry>,
    rooms: Arc<RoomRouter>,
    presence: PresenceTracker,
    unread: UnreadAggregator,
    graph: SocialGraph,
    messages: Arc<dyn MessageStore>,
    verifier: Arc<dyn AuthVerifier>,
    /// Broadcast sessions each connection joined as a viewer
    viewings: DashMap<ConnectionId, HashSet<SessionId>>,
    store_timeout: Duration,
}

impl Hub {
    pub fn new(stores: Stores, verifier: Arc<dyn AuthVerifier>, store_timeout: Duration) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let rooms = Arc::new(RoomRouter::new(registry.clone()));

        Self {
            presence: PresenceTracker::new(stores.live, store_timeout),
            unread: UnreadAggregator::new(stores.unread, store_timeout),
            graph: SocialGraph::new(
                stores.relationships,
                stores.notifications,
                rooms.clone(),
                store_timeout,
            ),
            messages: stores.messages,
            registry,
            rooms,
            verifier,
            viewings: DashMap::new(),
            store_timeout,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomRouter {
        &self.rooms
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn verifier(&self) -> &dyn AuthVerifier {
        self.verifier.as_ref()
    }

    // ===== Connection lifecycle =====

    /// Verify a credential and register the connection
    pub async fn connect(
        &self,
        credential: &str,
        outbound: EventSender,
    ) -> Result<ConnectionHandle, AuthError> {
        let identity = self.verifier.verify(credential).await?;
        Ok(self.connect_identity(identity, outbound))
    }

    /// Register a connection for an already verified identity
    pub fn connect_identity(&self, identity: AuthIdentity, outbound: EventSender) -> ConnectionHandle {
        let id = ConnectionId::new();
        let shutdown = self.registry.register(
            identity.user_id,
            id,
            identity.display_name.clone(),
            outbound,
        );
        self.rooms.join(id, &RoomName::personal(identity.user_id));

        tracing::info!(
            user_id = %identity.user_id,
            connection_id = %id,
            online_users = self.registry.online_count(),
            "Connection opened"
        );

        ConnectionHandle {
            id,
            user_id: identity.user_id,
            display_name: identity.display_name,
            shutdown,
        }
    }

    /// Remove a connection and everything it holds
    ///
    /// Returns `false` when the connection was already gone.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> bool {
        let Some(record) = self.registry.unregister(connection_id) else {
            return false;
        };

        for (room, user_id) in self.rooms.clear_typing(connection_id) {
            let event = HubEvent::typing(room.to_string(), user_id, &record.display_name, false);
            self.rooms.broadcast_except(&room, &event, connection_id);
        }

        let rooms = self.rooms.leave_all(connection_id);
        self.release_viewings(connection_id, record.user_id).await;
        record.shutdown.notify_one();

        tracing::info!(
            user_id = %record.user_id,
            connection_id = %connection_id,
            rooms = rooms.len(),
            lifetime_secs = record.connected_at.elapsed().as_secs(),
            "Connection closed"
        );
        true
    }

    /// Disconnect every connection silent for longer than `grace`
    pub async fn reap_stale(&self, grace: Duration) -> usize {
        let mut reaped = 0;
        for connection_id in self.registry.stale(grace) {
            if self.disconnect(connection_id).await {
                tracing::warn!(connection_id = %connection_id, "Reaped stale connection");
                reaped += 1;
            }
        }
        reaped
    }

    /// Record activity on a connection
    pub fn touch(&self, connection_id: ConnectionId) {
        self.registry.touch(connection_id);
    }

    /// Queue an event on one connection
    pub fn send_to(&self, connection_id: ConnectionId, event: HubEvent) -> bool {
        self.registry.send_to(connection_id, event)
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.registry.is_online(user_id)
    }

    pub fn online_users(&self) -> usize {
        self.registry.online_count()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    // ===== Rooms =====

    fn require_user(&self, connection_id: ConnectionId) -> Result<UserId, HubError> {
        self.registry
            .user_of(connection_id)
            .ok_or(HubError::UnknownConnection(connection_id))
    }

    fn require_member(&self, connection_id: ConnectionId, room: &RoomName) -> Result<(), HubError> {
        if self.rooms.is_member(connection_id, room) {
            Ok(())
        } else {
            Err(HubError::NotInRoom(room.to_string()))
        }
    }

    /// Join a room by name
    pub fn join_room(&self, connection_id: ConnectionId, raw_room: &str) -> Result<RoomName, HubError> {
        let user_id = self.require_user(connection_id)?;
        let room = RoomName::parse(raw_room)?;
        if let Some(owner) = room.owner() {
            if owner != user_id {
                return Err(HubError::invalid_room(format!("{} belongs to another user", room)));
            }
        }

        self.rooms.join(connection_id, &room);

        // A disconnect that ran concurrently may have missed this membership
        if !self.registry.contains(connection_id) {
            self.rooms.leave(connection_id, &room);
            return Err(HubError::UnknownConnection(connection_id));
        }
        Ok(room)
    }

    /// Leave a room by name; `false` if the connection was not a member
    pub fn leave_room(&self, connection_id: ConnectionId, raw_room: &str) -> Result<bool, HubError> {
        let (user_id, display_name) = self
            .registry
            .identity_of(connection_id)
            .ok_or(HubError::UnknownConnection(connection_id))?;
        let room = RoomName::parse(raw_room)?;

        if self.rooms.clear_typing_in(&room, user_id, connection_id) {
            let event = HubEvent::typing(room.to_string(), user_id, &display_name, false);
            self.rooms.broadcast_except(&room, &event, connection_id);
        }
        Ok(self.rooms.leave(connection_id, &room))
    }

    /// Update the typing indicator; `true` when others were told
    pub fn send_typing(
        &self,
        connection_id: ConnectionId,
        raw_room: &str,
        is_typing: bool,
    ) -> Result<bool, HubError> {
        let (user_id, display_name) = self
            .registry
            .identity_of(connection_id)
            .ok_or(HubError::UnknownConnection(connection_id))?;
        let room = RoomName::parse(raw_room)?;
        self.require_member(connection_id, &room)?;

        if !self.rooms.set_typing(&room, user_id, connection_id, is_typing) {
            return Ok(false);
        }
        let event = HubEvent::typing(room.to_string(), user_id, &display_name, is_typing);
        self.rooms.broadcast_except(&room, &event, connection_id);
        Ok(true)
    }

    /// Record a read receipt and relay it to the rest of the room
    ///
    /// Returns `false` when the store did not accept the receipt (unknown
    /// message or reader outside the conversation); nothing is relayed then.
    pub async fn mark_read(
        &self,
        connection_id: ConnectionId,
        raw_room: &str,
        message_id: Uuid,
    ) -> Result<bool, HubError> {
        let user_id = self.require_user(connection_id)?;
        let room = RoomName::parse(raw_room)?;
        let Some(conversation) = room.conversation_id() else {
            return Err(HubError::invalid_room("read receipts need a conversation room"));
        };
        self.require_member(connection_id, &room)?;

        let recorded = bounded(
            "mark_read",
            self.store_timeout,
            self.messages.mark_read(conversation, message_id, user_id),
        )
        .await?;

        if recorded {
            let event = HubEvent::read_receipt(room.to_string(), message_id, user_id);
            self.rooms.broadcast_except(&room, &event, connection_id);
        } else {
            tracing::debug!(user_id = %user_id, room = %room, message_id = %message_id, "Read receipt not recorded");
        }
        Ok(recorded)
    }

    /// Fan out a message persisted by a collaborator
    pub fn deliver_message(&self, raw_room: &str, payload: serde_json::Value) -> Result<usize, HubError> {
        let room = RoomName::parse(raw_room)?;
        let event = HubEvent::message(room.to_string(), payload);
        Ok(self.rooms.broadcast(&room, &event))
    }

    /// Push a notification persisted by a collaborator to a user's devices
    pub fn notify_user(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        actor: UserId,
        body: serde_json::Value,
    ) -> usize {
        let event = HubEvent::notification(kind, actor, body);
        self.rooms.broadcast(&RoomName::personal(user_id), &event)
    }

    // ===== Unread =====

    pub async fn unread_counts(&self, user_id: UserId) -> Result<UnreadCounts, HubError> {
        self.unread.counts(user_id).await
    }

    // ===== Presence =====

    /// Add a viewer to a live broadcast
    ///
    /// `via` ties the viewer to a connection so it is released when the
    /// user's last connection watching the session goes away.
    pub async fn join_viewer(
        &self,
        raw_session: &str,
        viewer: ViewerId,
        via: Option<ConnectionId>,
    ) -> Result<u64, HubError> {
        let session = SessionId::parse(raw_session)?;
        let viewers = self.presence.join(&session, &viewer).await?;

        if let Some(connection_id) = via {
            self.viewings
                .entry(connection_id)
                .or_default()
                .insert(session.clone());

            if !self.registry.contains(connection_id) {
                self.viewings.remove(&connection_id);
                if let Some(user_id) = viewer.user_id() {
                    if !self.user_still_viewing(user_id, &session) {
                        return self.presence.leave(&session, &viewer).await;
                    }
                }
            }
        }
        Ok(viewers)
    }

    /// Remove a viewer from a live broadcast
    pub async fn leave_viewer(
        &self,
        raw_session: &str,
        viewer: ViewerId,
        via: Option<ConnectionId>,
    ) -> Result<u64, HubError> {
        let session = SessionId::parse(raw_session)?;

        if let Some(connection_id) = via {
            if let Some(mut sessions) = self.viewings.get_mut(&connection_id) {
                sessions.remove(&session);
            }
            self.viewings.remove_if(&connection_id, |_, sessions| sessions.is_empty());

            // Another tab of the same user is still watching
            if let Some(user_id) = viewer.user_id() {
                if self.user_still_viewing(user_id, &session) {
                    return self.presence.viewer_count(&session).await;
                }
            }
        }

        self.presence.leave(&session, &viewer).await
    }

    /// Forget the viewers of an ended broadcast
    pub async fn end_session(&self, raw_session: &str) -> Result<usize, HubError> {
        let session = SessionId::parse(raw_session)?;
        for mut sessions in self.viewings.iter_mut() {
            sessions.remove(&session);
        }
        self.viewings.retain(|_, sessions| !sessions.is_empty());
        Ok(self.presence.end_session(&session).await)
    }

    fn user_still_viewing(&self, user_id: UserId, session: &SessionId) -> bool {
        self.registry
            .connections_of(user_id)
            .into_iter()
            .any(|other| {
                self.viewings
                    .get(&other)
                    .is_some_and(|sessions| sessions.contains(session))
            })
    }

    async fn release_viewings(&self, connection_id: ConnectionId, user_id: UserId) {
        let Some((_, sessions)) = self.viewings.remove(&connection_id) else {
            return;
        };

        let viewer = ViewerId::User(user_id);
        for session in sessions {
            if self.user_still_viewing(user_id, &session) {
                continue;
            }
            if let Err(e) = self.presence.leave(&session, &viewer).await {
                tracing::warn!(
                    connection_id = %connection_id,
                    session_id = %session,
                    "Failed to release viewer on disconnect: {}",
                    e
                );
            }
        }
    }

    // ===== Relationships =====

    pub async fn send_request(&self, from: UserId, to: UserId) -> Result<RequestOutcome, HubError> {
        self.graph.send_request(from, to).await
    }

    pub async fn cancel_request(&self, from: UserId, to: UserId) -> Result<bool, HubError> {
        self.graph.cancel_request(from, to).await
    }

    pub async fn accept_request(&self, by: UserId, from: UserId) -> Result<(), HubError> {
        self.graph.accept_request(by, from).await
    }

    pub async fn reject_request(&self, by: UserId, from: UserId) -> Result<(), HubError> {
        self.graph.reject_request(by, from).await
    }

    pub async fn unfriend(&self, a: UserId, b: UserId) -> Result<bool, HubError> {
        self.graph.unfriend(a, b).await
    }

    pub async fn list_friends(&self, user_id: UserId) -> Result<Vec<UserId>, HubError> {
        self.graph.list_friends(user_id).await
    }

    pub async fn relationship(&self, user_id: UserId, other: UserId) -> Result<EdgeState, HubError> {
        self.graph.relationship(user_id, other).await
    }
}
