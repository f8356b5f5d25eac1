//! PostgreSQL store
//!
//! Relationship transitions run in one transaction of conditional statements.
//! Each transaction touches the row owned by the *incoming* side of the pair
//! first (`(to, from)` for a request from `from` to `to`), so two users acting
//! on the same pair at once queue on the same row instead of interleaving.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{
    is_transient_sqlx, LiveSessionStore, MessageStore, NotificationStore, RelationshipStore,
    StoreError, UnreadSource,
};
use crate::shared::identity::UserId;
use crate::shared::social::{EdgeState, NewNotification, NotificationKind, RequestOutcome};

/// Attempts for a friend request that keeps colliding with a crossing request
const REQUEST_ATTEMPTS: usize = 3;

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// One attempt at `create_request`; `None` means the pair changed under us
    async fn try_create_request(
        &self,
        from: UserId,
        to: UserId,
    ) -> Result<Option<RequestOutcome>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // `to` already asked `from`: both sides become friends
        let crossing = sqlx::query(
            r#"
            UPDATE relationship_edges SET state = 'friends', updated_at = now()
            WHERE owner_id = $1 AND peer_id = $2 AND state = 'incoming'
            RETURNING owner_id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *tx)
        .await?;

        if crossing.is_some() {
            upsert_edge(&mut tx, to, from, EdgeState::Friends).await?;
            tx.commit().await?;
            return Ok(Some(RequestOutcome::MutuallyAccepted));
        }

        let created = sqlx::query(
            r#"
            INSERT INTO relationship_edges (owner_id, peer_id, state)
            VALUES ($1, $2, 'incoming')
            ON CONFLICT (owner_id, peer_id) DO NOTHING
            RETURNING owner_id
            "#,
        )
        .bind(to)
        .bind(from)
        .fetch_optional(&mut *tx)
        .await?;

        if created.is_some() {
            let outgoing = sqlx::query(
                r#"
                INSERT INTO relationship_edges (owner_id, peer_id, state)
                VALUES ($1, $2, 'outgoing')
                ON CONFLICT (owner_id, peer_id) DO NOTHING
                RETURNING owner_id
                "#,
            )
            .bind(from)
            .bind(to)
            .fetch_optional(&mut *tx)
            .await?;

            if outgoing.is_some() {
                tx.commit().await?;
                return Ok(Some(RequestOutcome::Created));
            }

            // The sender's row exists while the recipient's did not: drift
            // from an outside writer, or a row committed concurrently
            return match edge_in(&mut tx, from, to).await? {
                EdgeState::Friends => {
                    upsert_edge(&mut tx, to, from, EdgeState::Friends).await?;
                    tx.commit().await?;
                    Ok(Some(RequestOutcome::AlreadyFriends))
                }
                EdgeState::Outgoing => {
                    tx.commit().await?;
                    Ok(Some(RequestOutcome::Created))
                }
                EdgeState::Incoming | EdgeState::None => {
                    tx.rollback().await?;
                    Ok(None)
                }
            };
        }

        let existing = edge_in(&mut tx, to, from).await?;
        tx.rollback().await?;

        Ok(match existing {
            EdgeState::Incoming => Some(RequestOutcome::AlreadyPending),
            EdgeState::Friends => Some(RequestOutcome::AlreadyFriends),
            EdgeState::Outgoing | EdgeState::None => None,
        })
    }
}

/// Read one edge inside a transaction
async fn edge_in(
    tx: &mut Transaction<'_, Postgres>,
    owner: UserId,
    peer: UserId,
) -> Result<EdgeState, sqlx::Error> {
    let row = sqlx::query("SELECT state FROM relationship_edges WHERE owner_id = $1 AND peer_id = $2")
        .bind(owner)
        .bind(peer)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row
        .and_then(|r| EdgeState::from_str(r.get::<String, _>("state").as_str()))
        .unwrap_or_default())
}

async fn upsert_edge(
    tx: &mut Transaction<'_, Postgres>,
    owner: UserId,
    peer: UserId,
    state: EdgeState,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO relationship_edges (owner_id, peer_id, state)
        VALUES ($1, $2, $3)
        ON CONFLICT (owner_id, peer_id)
        DO UPDATE SET state = EXCLUDED.state, updated_at = now()
        "#,
    )
    .bind(owner)
    .bind(peer)
    .bind(state.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn to_count(value: i64) -> u64 {
    value.max(0) as u64
}

#[async_trait]
impl RelationshipStore for PgStore {
    async fn edge(&self, owner: UserId, peer: UserId) -> Result<EdgeState, StoreError> {
        let row = sqlx::query("SELECT state FROM relationship_edges WHERE owner_id = $1 AND peer_id = $2")
            .bind(owner)
            .bind(peer)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .and_then(|r| EdgeState::from_str(r.get::<String, _>("state").as_str()))
            .unwrap_or_default())
    }

    async fn create_request(&self, from: UserId, to: UserId) -> Result<RequestOutcome, StoreError> {
        for attempt in 1..=REQUEST_ATTEMPTS {
            match self.try_create_request(from, to).await {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => {
                    tracing::debug!(%from, %to, attempt, "Relationship changed during request, retrying");
                }
                Err(e) if is_transient_sqlx(&e) && attempt < REQUEST_ATTEMPTS => {
                    tracing::debug!(%from, %to, attempt, "Request transaction aborted: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Contention("create_request"))
    }

    async fn remove_request(&self, from: UserId, to: UserId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let incoming = sqlx::query(
            "DELETE FROM relationship_edges WHERE owner_id = $1 AND peer_id = $2 AND state = 'incoming'",
        )
        .bind(to)
        .bind(from)
        .execute(&mut *tx)
        .await?;

        let outgoing = sqlx::query(
            "DELETE FROM relationship_edges WHERE owner_id = $1 AND peer_id = $2 AND state = 'outgoing'",
        )
        .bind(from)
        .bind(to)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(incoming.rows_affected() + outgoing.rows_affected() > 0)
    }

    async fn accept_request(&self, by: UserId, from: UserId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let accepted = sqlx::query(
            r#"
            UPDATE relationship_edges SET state = 'friends', updated_at = now()
            WHERE owner_id = $1 AND peer_id = $2 AND state = 'incoming'
            "#,
        )
        .bind(by)
        .bind(from)
        .execute(&mut *tx)
        .await?;

        if accepted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        upsert_edge(&mut tx, from, by, EdgeState::Friends).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn reject_request(&self, by: UserId, from: UserId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let rejected = sqlx::query(
            "DELETE FROM relationship_edges WHERE owner_id = $1 AND peer_id = $2 AND state = 'incoming'",
        )
        .bind(by)
        .bind(from)
        .execute(&mut *tx)
        .await?;

        if rejected.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "DELETE FROM relationship_edges WHERE owner_id = $1 AND peer_id = $2 AND state = 'outgoing'",
        )
        .bind(from)
        .bind(by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn remove_relationship(&self, a: UserId, b: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM relationship_edges
            WHERE (owner_id = $1 AND peer_id = $2) OR (owner_id = $2 AND peer_id = $1)
            "#,
        )
        .bind(a)
        .bind(b)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn friend_candidates(&self, user: UserId) -> Result<Vec<UserId>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT peer_id FROM relationship_edges
            WHERE owner_id = $1 AND state = 'friends'
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("peer_id")).collect())
    }

    async fn reciprocating(
        &self,
        user: UserId,
        candidates: &[UserId],
    ) -> Result<Vec<UserId>, StoreError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT owner_id FROM relationship_edges
            WHERE peer_id = $1 AND state = 'friends' AND owner_id = ANY($2)
            "#,
        )
        .bind(user)
        .bind(candidates)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("owner_id")).collect())
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_unique(&self, notification: &NewNotification) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, actor_id, kind, body, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, false, now())
            ON CONFLICT (recipient_id, actor_id, kind) WHERE NOT is_read DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.recipient)
        .bind(notification.actor)
        .bind(notification.kind.as_str())
        .bind(sqlx::types::Json(&notification.body))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn retract(
        &self,
        recipient: UserId,
        actor: UserId,
        kind: NotificationKind,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE recipient_id = $1 AND actor_id = $2 AND kind = $3",
        )
        .bind(recipient)
        .bind(actor)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn mark_read(
        &self,
        conversation: &str,
        message_id: Uuid,
        reader: UserId,
    ) -> Result<bool, StoreError> {
        // The no-op update makes RETURNING yield a row for repeated reads too
        let row = sqlx::query(
            r#"
            INSERT INTO message_reads (message_id, user_id, read_at)
            SELECT m.id, $3, now()
            FROM chat_messages m
            JOIN conversation_participants p
              ON p.conversation_id = m.conversation_id AND p.user_id = $3
            WHERE m.id = $2 AND m.conversation_id = $1
            ON CONFLICT (message_id, user_id) DO UPDATE SET read_at = message_reads.read_at
            RETURNING message_id
            "#,
        )
        .bind(conversation)
        .bind(message_id)
        .bind(reader)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl UnreadSource for PgStore {
    async fn unread_messages(&self, user: UserId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM chat_messages m
            JOIN conversation_participants p
              ON p.conversation_id = m.conversation_id AND p.user_id = $1
            WHERE NOT m.is_system
              AND m.sender_id IS DISTINCT FROM $1
              AND NOT EXISTS (
                  SELECT 1 FROM message_reads r WHERE r.message_id = m.id AND r.user_id = $1
              )
            "#,
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await?;

        Ok(to_count(count))
    }

    async fn unread_notifications(&self, user: UserId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE recipient_id = $1 AND NOT is_read AND kind <> $2
            "#,
        )
        .bind(user)
        .bind(NotificationKind::FriendRequest.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(to_count(count))
    }

    async fn pending_requests(&self, user: UserId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM relationship_edges WHERE owner_id = $1 AND state = 'incoming'",
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await?;

        Ok(to_count(count))
    }
}

#[async_trait]
impl LiveSessionStore for PgStore {
    async fn increment_viewers(&self, session: &str) -> Result<Option<u64>, StoreError> {
        let viewers: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE live_sessions SET viewer_count = viewer_count + 1
            WHERE id = $1 AND is_live
            RETURNING viewer_count
            "#,
        )
        .bind(session)
        .fetch_optional(&self.pool)
        .await?;

        Ok(viewers.map(to_count))
    }

    async fn decrement_viewers(&self, session: &str) -> Result<u64, StoreError> {
        let viewers: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE live_sessions SET viewer_count = GREATEST(viewer_count - 1, 0)
            WHERE id = $1
            RETURNING viewer_count
            "#,
        )
        .bind(session)
        .fetch_optional(&self.pool)
        .await?;

        Ok(viewers.map(to_count).unwrap_or(0))
    }

    async fn viewer_count(&self, session: &str) -> Result<u64, StoreError> {
        let viewers: Option<i64> =
            sqlx::query_scalar("SELECT viewer_count FROM live_sessions WHERE id = $1")
                .bind(session)
                .fetch_optional(&self.pool)
                .await?;

        Ok(viewers.map(to_count).unwrap_or(0))
    }

    async fn raise_peak(&self, session: &str, viewers: u64) -> Result<(), StoreError> {
        sqlx::query("UPDATE live_sessions SET peak_viewers = $2 WHERE id = $1 AND peak_viewers < $2")
            .bind(session)
            .bind(i64::try_from(viewers).unwrap_or(i64::MAX))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
