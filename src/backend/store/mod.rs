//! Store Module
//!
//! Narrow interfaces to the durable store owned by the CRUD backend. The hub
//! never caches what it reads through them beyond a single request.
//!
//! Relationship mutations are expressed as whole transitions
//! (`accept_request`, `remove_request`, ...) instead of get/put pairs so that
//! every implementation commits them as conditional updates. An
//! implementation that splits them into a read followed by a write
//! reintroduces the races the social graph exists to prevent.
//!
//! # Implementations
//!
//! - **`postgres`** - `PgStore`, conditional SQL over a `PgPool`
//! - **`memory`** - `MemoryStore`, one critical section per operation; used
//!   when `DATABASE_URL` is not configured and in tests

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::shared::identity::UserId;
use crate::shared::social::{EdgeState, NewNotification, NotificationKind, RequestOutcome};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Durable store failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error reported by the database driver
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store cannot serve requests right now
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A conditional update kept losing to concurrent writers
    #[error("Contention on {0}, retry later")]
    Contention(&'static str),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Contention(_) => true,
            Self::Database(err) => is_transient_sqlx(err),
        }
    }
}

/// Serialization failures and deadlocks are resolved by retrying.
pub(crate) fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001") | Some("40P01")),
        _ => false,
    }
}

/// Social graph edges, one row per ordered pair
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// State of the edge from `owner` toward `peer`
    async fn edge(&self, owner: UserId, peer: UserId) -> Result<EdgeState, StoreError>;

    /// Create a pending request, or turn a crossing request into friendship
    async fn create_request(&self, from: UserId, to: UserId) -> Result<RequestOutcome, StoreError>;

    /// Remove both sides of a pending `from -> to` request; `false` if absent
    async fn remove_request(&self, from: UserId, to: UserId) -> Result<bool, StoreError>;

    /// Turn the pending `from -> by` request into friendship; `false` if absent
    async fn accept_request(&self, by: UserId, from: UserId) -> Result<bool, StoreError>;

    /// Drop the pending `from -> by` request; `false` if absent
    async fn reject_request(&self, by: UserId, from: UserId) -> Result<bool, StoreError>;

    /// Drop every edge between `a` and `b` in both directions
    async fn remove_relationship(&self, a: UserId, b: UserId) -> Result<bool, StoreError>;

    /// Users that `user`'s own side lists as friends
    async fn friend_candidates(&self, user: UserId) -> Result<Vec<UserId>, StoreError>;

    /// Subset of `candidates` whose own side lists `user` as a friend
    async fn reciprocating(
        &self,
        user: UserId,
        candidates: &[UserId],
    ) -> Result<Vec<UserId>, StoreError>;
}

/// User notifications
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert unless an unread notification with the same recipient, actor
    /// and kind exists; `true` when inserted
    async fn insert_unique(&self, notification: &NewNotification) -> Result<bool, StoreError>;

    /// Delete notifications matching recipient, actor and kind
    async fn retract(
        &self,
        recipient: UserId,
        actor: UserId,
        kind: NotificationKind,
    ) -> Result<u64, StoreError>;
}

/// Conversation messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Record that `reader` has seen `message_id`. `false` when the message is
    /// not part of `conversation` or `reader` does not participate in it.
    async fn mark_read(
        &self,
        conversation: &str,
        message_id: Uuid,
        reader: UserId,
    ) -> Result<bool, StoreError>;
}

/// Counters behind the unread aggregate
#[async_trait]
pub trait UnreadSource: Send + Sync {
    async fn unread_messages(&self, user: UserId) -> Result<u64, StoreError>;
    async fn unread_notifications(&self, user: UserId) -> Result<u64, StoreError>;
    async fn pending_requests(&self, user: UserId) -> Result<u64, StoreError>;
}

/// Broadcast-session registry, authoritative on whether a session is live
#[async_trait]
pub trait LiveSessionStore: Send + Sync {
    /// Increment the viewer counter if the session is live; `None` otherwise
    async fn increment_viewers(&self, session: &str) -> Result<Option<u64>, StoreError>;

    /// Decrement the viewer counter, never below zero
    async fn decrement_viewers(&self, session: &str) -> Result<u64, StoreError>;

    /// Current viewer counter, zero for unknown sessions
    async fn viewer_count(&self, session: &str) -> Result<u64, StoreError>;

    /// Raise the peak-viewer mark to `viewers` if it is higher
    async fn raise_peak(&self, session: &str, viewers: u64) -> Result<(), StoreError>;
}

/// Every store interface the hub consumes
#[derive(Clone)]
pub struct Stores {
    pub relationships: Arc<dyn RelationshipStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub messages: Arc<dyn MessageStore>,
    pub unread: Arc<dyn UnreadSource>,
    pub live: Arc<dyn LiveSessionStore>,
}

impl Stores {
    /// Use one backend for every interface
    pub fn from_backend<S>(store: Arc<S>) -> Self
    where
        S: RelationshipStore
            + NotificationStore
            + MessageStore
            + UnreadSource
            + LiveSessionStore
            + 'static,
    {
        Self {
            relationships: store.clone(),
            notifications: store.clone(),
            messages: store.clone(),
            unread: store.clone(),
            live: store,
        }
    }
}
