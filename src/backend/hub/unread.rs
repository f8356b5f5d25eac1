//! Unread Aggregator
//!
//! Computes the unread aggregate a client shows after reconnecting. Nothing
//! is cached: every call reads the store, with the three counters queried
//! concurrently and the whole call bounded by the store timeout.

use std::sync::Arc;
use std::time::Duration;

use super::bounded;
use crate::backend::error::HubError;
use crate::backend::store::{StoreError, UnreadSource};
use crate::shared::identity::UserId;
use crate::shared::social::UnreadCounts;

pub struct UnreadAggregator {
    source: Arc<dyn UnreadSource>,
    store_timeout: Duration,
}

impl UnreadAggregator {
    pub fn new(source: Arc<dyn UnreadSource>, store_timeout: Duration) -> Self {
        Self {
            source,
            store_timeout,
        }
    }

    /// Unread messages, notifications and pending requests of a user
    pub async fn counts(&self, user_id: UserId) -> Result<UnreadCounts, HubError> {
        let counts = bounded("unread_counts", self.store_timeout, async {
            let (messages, notifications, pending_requests) = tokio::try_join!(
                self.source.unread_messages(user_id),
                self.source.unread_notifications(user_id),
                self.source.pending_requests(user_id),
            )?;
            Ok::<_, StoreError>(UnreadCounts {
                messages,
                notifications,
                pending_requests,
            })
        })
        .await?;

        tracing::debug!(user_id = %user_id, total = counts.total(), "Unread counts computed");
        Ok(counts)
    }
}
