//! Friend-request transitions through the hub

use pretty_assertions::assert_eq;
use std::collections::HashSet;
use uuid::Uuid;
use xfhub::backend::error::HubError;
use xfhub::shared::event::EventType;
use xfhub::shared::social::{EdgeState, NotificationKind, RequestOutcome};

use crate::common::{drain_of, next_of, TestHub};
use crate::{assert_err, assert_ok};

#[tokio::test]
async fn test_request_notifies_and_pushes_incoming_state() {
    let fixture = TestHub::new();
    let alice = fixture.connect_new().await;
    let mut bob = fixture.connect_new().await;

    let outcome = assert_ok!(fixture.hub.send_request(alice.user_id(), bob.user_id()).await);
    assert_eq!(outcome, RequestOutcome::Created);

    let notification = next_of(&mut bob.rx, EventType::Notification).await;
    assert_eq!(notification.payload["kind"], "friend_request");
    assert_eq!(notification.payload["actor"], alice.user_id().to_string());

    let change = next_of(&mut bob.rx, EventType::RelationshipChanged).await;
    assert_eq!(change.payload["user_id"], alice.user_id().to_string());
    assert_eq!(change.payload["state"], "incoming");

    assert_eq!(
        assert_ok!(fixture.hub.relationship(alice.user_id(), bob.user_id()).await),
        EdgeState::Outgoing
    );
}

#[tokio::test]
async fn test_repeated_request_is_idempotent() {
    let fixture = TestHub::new();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let mut bob_client = fixture.connect(bob).await;

    assert_eq!(assert_ok!(fixture.hub.send_request(alice, bob).await), RequestOutcome::Created);
    assert_eq!(
        assert_ok!(fixture.hub.send_request(alice, bob).await),
        RequestOutcome::AlreadyPending
    );

    assert_eq!(drain_of(&mut bob_client.rx, EventType::Notification).len(), 1);
    assert_eq!(
        fixture.store.unread_notifications_of(bob).await,
        vec![(alice, NotificationKind::FriendRequest)]
    );
}

#[tokio::test]
async fn test_mutual_requests_become_friends() {
    let fixture = TestHub::new();
    let mut alice = fixture.connect_new().await;
    let bob = fixture.connect_new().await;
    let (a, b) = (alice.user_id(), bob.user_id());

    assert_eq!(assert_ok!(fixture.hub.send_request(a, b).await), RequestOutcome::Created);
    assert_eq!(
        assert_ok!(fixture.hub.send_request(b, a).await),
        RequestOutcome::MutuallyAccepted
    );

    assert_eq!(assert_ok!(fixture.hub.relationship(a, b).await), EdgeState::Friends);
    assert_eq!(assert_ok!(fixture.hub.relationship(b, a).await), EdgeState::Friends);
    assert_eq!(assert_ok!(fixture.hub.list_friends(a).await), vec![b]);
    assert_eq!(assert_ok!(fixture.hub.list_friends(b).await), vec![a]);

    // No pending request is left behind on either side
    assert_eq!(assert_ok!(fixture.hub.unread_counts(a).await).pending_requests, 0);
    assert_eq!(assert_ok!(fixture.hub.unread_counts(b).await).pending_requests, 0);
    assert!(fixture
        .store
        .unread_notifications_of(b)
        .await
        .iter()
        .all(|(_, kind)| *kind != NotificationKind::FriendRequest));

    let change = next_of(&mut alice.rx, EventType::RelationshipChanged).await;
    assert_eq!(change.payload["state"], "friends");
}

#[tokio::test]
async fn test_request_then_cancel_then_accept_fails() {
    let fixture = TestHub::new();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    assert_ok!(fixture.hub.send_request(alice, bob).await);
    assert!(assert_ok!(fixture.hub.cancel_request(alice, bob).await));

    let result = fixture.hub.accept_request(bob, alice).await;
    assert_err!(result, HubError::NoSuchRequest { .. });
    assert_eq!(assert_ok!(fixture.hub.relationship(alice, bob).await), EdgeState::None);
    assert_eq!(assert_ok!(fixture.hub.relationship(bob, alice).await), EdgeState::None);
    assert!(fixture.store.unread_notifications_of(bob).await.is_empty());

    // Cancelling again changes nothing
    assert!(!assert_ok!(fixture.hub.cancel_request(alice, bob).await));
}

#[tokio::test]
async fn test_only_the_recipient_can_accept() {
    let fixture = TestHub::new();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    assert_ok!(fixture.hub.send_request(alice, bob).await);

    // The sender holds the outgoing side and cannot accept its own request
    assert_err!(
        fixture.hub.accept_request(alice, bob).await,
        HubError::NoSuchRequest { .. }
    );
    assert_err!(fixture.hub.send_request(alice, alice).await, HubError::SelfRequest);
}

#[tokio::test]
async fn test_concurrent_accept_and_reject() {
    for _ in 0..25 {
        let fixture = TestHub::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        assert_ok!(fixture.hub.send_request(alice, bob).await);

        let hub = fixture.hub.clone();
        let accept = tokio::spawn(async move { hub.accept_request(bob, alice).await });
        let hub = fixture.hub.clone();
        let reject = tokio::spawn(async move { hub.reject_request(bob, alice).await });

        let accepted = accept.await.unwrap();
        let rejected = reject.await.unwrap();
        assert!(
            accepted.is_ok() != rejected.is_ok(),
            "exactly one of accept/reject must win: {:?} / {:?}",
            accepted,
            rejected
        );

        let forward = assert_ok!(fixture.hub.relationship(alice, bob).await);
        let backward = assert_ok!(fixture.hub.relationship(bob, alice).await);
        let expected = if accepted.is_ok() {
            EdgeState::Friends
        } else {
            EdgeState::None
        };
        assert_eq!((forward, backward), (expected, expected));
    }
}

#[tokio::test]
async fn test_concurrent_crossing_requests() {
    for _ in 0..25 {
        let fixture = TestHub::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let hub = fixture.hub.clone();
        let forward = tokio::spawn(async move { hub.send_request(alice, bob).await });
        let hub = fixture.hub.clone();
        let backward = tokio::spawn(async move { hub.send_request(bob, alice).await });

        let outcomes: HashSet<RequestOutcome> = [
            forward.await.unwrap().unwrap(),
            backward.await.unwrap().unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            outcomes,
            HashSet::from([RequestOutcome::Created, RequestOutcome::MutuallyAccepted])
        );
        assert_eq!(assert_ok!(fixture.hub.relationship(alice, bob).await), EdgeState::Friends);
        assert_eq!(assert_ok!(fixture.hub.relationship(bob, alice).await), EdgeState::Friends);
    }
}

#[tokio::test]
async fn test_unfriend_clears_both_sides_and_notifications() {
    let fixture = TestHub::new();
    let alice = fixture.connect_new().await;
    let mut bob = fixture.connect_new().await;
    let (a, b) = (alice.user_id(), bob.user_id());

    assert_ok!(fixture.hub.send_request(a, b).await);
    assert_ok!(fixture.hub.accept_request(b, a).await);
    assert_eq!(
        fixture.store.unread_notifications_of(a).await,
        vec![(b, NotificationKind::FriendAccepted)]
    );
    drain_of(&mut bob.rx, EventType::RelationshipChanged);

    assert!(assert_ok!(fixture.hub.unfriend(a, b).await));
    assert_eq!(assert_ok!(fixture.hub.relationship(a, b).await), EdgeState::None);
    assert_eq!(assert_ok!(fixture.hub.relationship(b, a).await), EdgeState::None);
    assert!(fixture.store.unread_notifications_of(a).await.is_empty());
    assert!(assert_ok!(fixture.hub.list_friends(b).await).is_empty());

    let change = next_of(&mut bob.rx, EventType::RelationshipChanged).await;
    assert_eq!(change.payload["user_id"], a.to_string());
    assert_eq!(change.payload["state"], "none");

    assert!(!assert_ok!(fixture.hub.unfriend(a, b).await));
}

#[tokio::test]
async fn test_one_sided_friend_edge_is_excluded() {
    let fixture = TestHub::new();
    let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    assert_ok!(fixture.hub.send_request(alice, bob).await);
    assert_ok!(fixture.hub.accept_request(bob, alice).await);
    // Drift written by some other system
    fixture.store.force_edge(alice, carol, EdgeState::Friends).await;

    assert_eq!(assert_ok!(fixture.hub.list_friends(alice).await), vec![bob]);
}
