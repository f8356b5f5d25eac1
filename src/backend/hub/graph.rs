/**
 * Social Graph Mutator
 *
 * Friend-request transitions on the bidirectional relationship graph. The
 * store commits every transition as one conditional update, so two users
 * acting on the same pair at once cannot leave the pair half-updated: the
 * loser of a race observes the winner's result (`NoSuchRequest`, or an
 * idempotent success).
 *
 * # Side effects
 *
 * After a transition commits, notifications are created or retracted and a
 * `relationship_changed` event is pushed to the counterpart's personal room.
 * The relationship row is authoritative; a notification that fails to write
 * is logged and the transition still succeeds. Retrying the same call
 * repairs it because every transition is idempotent.
 *
 * # Transitions
 *
 * | Call | Guard | Result |
 * |------|-------|--------|
 * | `send_request(a, b)` | none | pending `a -> b`, or friends if `b -> a` was pending |
 * | `cancel_request(a, b)` | none | both pending sides removed |
 * | `accept_request(b, a)` | `a -> b` pending | friends |
 * | `reject_request(b, a)` | `a -> b` pending | none |
 * | `unfriend(a, b)` | none | none in both directions |
 */

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::bounded;
use super::rooms::{RoomName, RoomRouter};
use crate::backend::error::HubError;
use crate::backend::store::{NotificationStore, RelationshipStore};
use crate::shared::event::HubEvent;
use crate::shared::identity::UserId;
use crate::shared::social::{EdgeState, NewNotification, NotificationKind, RequestOutcome};

pub struct SocialGraph {
    relationships: Arc<dyn RelationshipStore>,
    notifications: Arc<dyn NotificationStore>,
    rooms: Arc<RoomRouter>,
    store_timeout: Duration,
}

impl SocialGraph {
    pub fn new(
        relationships: Arc<dyn RelationshipStore>,
        notifications: Arc<dyn NotificationStore>,
        rooms: Arc<RoomRouter>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            relationships,
            notifications,
            rooms,
            store_timeout,
        }
    }

    /// Send a friend request from `from` to `to`
    pub async fn send_request(&self, from: UserId, to: UserId) -> Result<RequestOutcome, HubError> {
        if from == to {
            return Err(HubError::SelfRequest);
        }

        let outcome = bounded(
            "send_request",
            self.store_timeout,
            self.relationships.create_request(from, to),
        )
        .await?;

        match outcome {
            RequestOutcome::Created => {
                self.notify(to, from, NotificationKind::FriendRequest).await;
                self.emit_change(to, from, EdgeState::Incoming);
            }
            RequestOutcome::AlreadyPending => {
                // Recreates the notification only if it was lost
                self.notify(to, from, NotificationKind::FriendRequest).await;
            }
            RequestOutcome::AlreadyFriends => {}
            RequestOutcome::MutuallyAccepted => {
                self.retract(from, to, NotificationKind::FriendRequest).await;
                self.notify(to, from, NotificationKind::FriendAccepted).await;
                self.emit_change(to, from, EdgeState::Friends);
            }
        }

        tracing::info!(from = %from, to = %to, outcome = ?outcome, "Friend request sent");
        Ok(outcome)
    }

    /// Withdraw a pending request; `true` when something was removed
    pub async fn cancel_request(&self, from: UserId, to: UserId) -> Result<bool, HubError> {
        if from == to {
            return Err(HubError::SelfRequest);
        }

        let cancelled = bounded(
            "cancel_request",
            self.store_timeout,
            self.relationships.remove_request(from, to),
        )
        .await?;

        self.retract(to, from, NotificationKind::FriendRequest).await;
        if cancelled {
            self.emit_change(to, from, EdgeState::None);
            tracing::info!(from = %from, to = %to, "Friend request cancelled");
        }
        Ok(cancelled)
    }

    /// Accept the pending request `from -> by`
    pub async fn accept_request(&self, by: UserId, from: UserId) -> Result<(), HubError> {
        if by == from {
            return Err(HubError::SelfRequest);
        }

        let accepted = bounded(
            "accept_request",
            self.store_timeout,
            self.relationships.accept_request(by, from),
        )
        .await?;
        if !accepted {
            tracing::debug!(by = %by, from = %from, "Accept found no pending request");
            return Err(HubError::NoSuchRequest { from, to: by });
        }

        self.retract(by, from, NotificationKind::FriendRequest).await;
        self.notify(from, by, NotificationKind::FriendAccepted).await;
        self.emit_change(from, by, EdgeState::Friends);

        tracing::info!(by = %by, from = %from, "Friend request accepted");
        Ok(())
    }

    /// Reject the pending request `from -> by`
    pub async fn reject_request(&self, by: UserId, from: UserId) -> Result<(), HubError> {
        if by == from {
            return Err(HubError::SelfRequest);
        }

        let rejected = bounded(
            "reject_request",
            self.store_timeout,
            self.relationships.reject_request(by, from),
        )
        .await?;
        if !rejected {
            tracing::debug!(by = %by, from = %from, "Reject found no pending request");
            return Err(HubError::NoSuchRequest { from, to: by });
        }

        self.retract(by, from, NotificationKind::FriendRequest).await;
        self.emit_change(from, by, EdgeState::None);

        tracing::info!(by = %by, from = %from, "Friend request rejected");
        Ok(())
    }

    /// Remove every edge between `a` and `b`; `true` when something was removed
    pub async fn unfriend(&self, a: UserId, b: UserId) -> Result<bool, HubError> {
        if a == b {
            return Err(HubError::SelfRequest);
        }

        let removed = bounded(
            "unfriend",
            self.store_timeout,
            self.relationships.remove_relationship(a, b),
        )
        .await?;

        for (recipient, actor) in [(a, b), (b, a)] {
            for kind in [NotificationKind::FriendRequest, NotificationKind::FriendAccepted] {
                self.retract(recipient, actor, kind).await;
            }
        }

        if removed {
            self.emit_change(b, a, EdgeState::None);
            tracing::info!(user_id = %a, peer = %b, "Relationship removed");
        }
        Ok(removed)
    }

    /// Friends confirmed on both sides
    ///
    /// One-sided friend rows are drift from outside writers; they are logged
    /// and left out.
    pub async fn list_friends(&self, user_id: UserId) -> Result<Vec<UserId>, HubError> {
        let candidates = bounded(
            "list_friends",
            self.store_timeout,
            self.relationships.friend_candidates(user_id),
        )
        .await?;
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let confirmed: HashSet<UserId> = bounded(
            "list_friends",
            self.store_timeout,
            self.relationships.reciprocating(user_id, &candidates),
        )
        .await?
        .into_iter()
        .collect();

        Ok(candidates
            .into_iter()
            .filter(|candidate| {
                let mutual = confirmed.contains(candidate);
                if !mutual {
                    tracing::warn!(
                        user_id = %user_id,
                        peer = %candidate,
                        "One-sided friend edge, excluding from friend list"
                    );
                }
                mutual
            })
            .collect())
    }

    /// `user_id`'s view of the edge toward `other`
    pub async fn relationship(&self, user_id: UserId, other: UserId) -> Result<EdgeState, HubError> {
        if user_id == other {
            return Ok(EdgeState::None);
        }
        bounded(
            "relationship",
            self.store_timeout,
            self.relationships.edge(user_id, other),
        )
        .await
    }

    /// Persist a notification and push it unless an unread duplicate exists
    async fn notify(&self, recipient: UserId, actor: UserId, kind: NotificationKind) {
        let notification = NewNotification::new(recipient, actor, kind);
        match bounded(
            "insert_notification",
            self.store_timeout,
            self.notifications.insert_unique(&notification),
        )
        .await
        {
            Ok(true) => {
                let event = HubEvent::notification(kind, actor, notification.body);
                self.rooms.broadcast(&RoomName::personal(recipient), &event);
            }
            Ok(false) => {
                tracing::debug!(recipient = %recipient, actor = %actor, kind = kind.as_str(), "Duplicate notification skipped");
            }
            Err(e) => {
                tracing::error!(recipient = %recipient, actor = %actor, kind = kind.as_str(), "Failed to store notification: {}", e);
            }
        }
    }

    async fn retract(&self, recipient: UserId, actor: UserId, kind: NotificationKind) {
        if let Err(e) = bounded(
            "retract_notification",
            self.store_timeout,
            self.notifications.retract(recipient, actor, kind),
        )
        .await
        {
            tracing::error!(recipient = %recipient, actor = %actor, kind = kind.as_str(), "Failed to retract notification: {}", e);
        }
    }

    /// Tell `recipient` its edge toward `peer` is now `state`
    fn emit_change(&self, recipient: UserId, peer: UserId, state: EdgeState) {
        let event = HubEvent::relationship_changed(peer, state);
        self.rooms.broadcast(&RoomName::personal(recipient), &event);
    }
}
