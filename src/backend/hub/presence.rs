/**
 * Presence Deduplicator
 *
 * Turns raw viewer join and leave signals into a viewer counter that cannot
 * be double-counted. Every live broadcast session has its own set of
 * distinct viewers; the stored counter only moves when the set changes.
 *
 * # Concurrency
 *
 * Each session's set sits behind its own async mutex that is held for the
 * whole check, mutate, store sequence, so a session has a single writer at
 * any time while unrelated sessions proceed in parallel.
 *
 * A set that becomes empty is marked retired before it is dropped from the
 * map. A task that acquired the retired set while it was being removed sees
 * the flag and starts over on a fresh set, so no viewer is ever recorded in
 * a set that is no longer reachable.
 *
 * # Failure handling
 *
 * - Session not live: the viewer is rolled back and `SessionNotActive` is
 *   returned
 * - Store failure or timeout on join: the viewer is rolled back
 * - Store failure or timeout on leave: the viewer is put back
 */

use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::bounded;
use super::rooms::is_valid_identifier;
use crate::backend::error::HubError;
use crate::backend::store::LiveSessionStore;
use crate::shared::identity::ViewerId;

/// Validated broadcast session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, HubError> {
        if !is_valid_identifier(raw) {
            return Err(HubError::invalid_session(format!("malformed session id {:?}", raw)));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
struct ViewerSet {
    viewers: HashSet<ViewerId>,
    retired: bool,
}

type SharedViewerSet = Arc<Mutex<ViewerSet>>;

/// Distinct viewers per broadcast session
pub struct PresenceTracker {
    sessions: DashMap<SessionId, SharedViewerSet>,
    store: Arc<dyn LiveSessionStore>,
    store_timeout: Duration,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn LiveSessionStore>, store_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            store,
            store_timeout,
        }
    }

    fn viewer_set(&self, session: &SessionId) -> SharedViewerSet {
        self.sessions.entry(session.clone()).or_default().clone()
    }

    /// Drop a set from the map if it is still the current one
    fn retire(&self, session: &SessionId, set: &SharedViewerSet, state: &mut ViewerSet) {
        state.retired = true;
        self.sessions
            .remove_if(session, |_, current| Arc::ptr_eq(current, set));
    }

    /// Viewer counter as stored
    pub async fn viewer_count(&self, session: &SessionId) -> Result<u64, HubError> {
        bounded(
            "viewer_count",
            self.store_timeout,
            self.store.viewer_count(session.as_str()),
        )
        .await
    }

    /// Add a viewer; returns the viewer counter after the call
    pub async fn join(&self, session: &SessionId, viewer: &ViewerId) -> Result<u64, HubError> {
        loop {
            let set = self.viewer_set(session);
            let mut state = set.lock().await;
            if state.retired {
                continue;
            }

            if state.viewers.contains(viewer) {
                drop(state);
                return self.viewer_count(session).await;
            }

            state.viewers.insert(viewer.clone());
            let incremented = bounded(
                "increment_viewers",
                self.store_timeout,
                self.store.increment_viewers(session.as_str()),
            )
            .await;

            let viewers = match incremented {
                Ok(Some(viewers)) => viewers,
                Ok(None) => {
                    self.roll_back(session, &set, &mut state, viewer);
                    tracing::debug!(session_id = %session, viewer = %viewer, "Join on inactive session");
                    return Err(HubError::SessionNotActive(session.to_string()));
                }
                Err(e) => {
                    self.roll_back(session, &set, &mut state, viewer);
                    return Err(e);
                }
            };

            // The counter is committed; a missed peak update is not worth failing the join
            if let Err(e) = bounded(
                "raise_peak",
                self.store_timeout,
                self.store.raise_peak(session.as_str(), viewers),
            )
            .await
            {
                tracing::warn!(session_id = %session, "Failed to raise peak viewers: {}", e);
            }

            tracing::debug!(session_id = %session, viewer = %viewer, viewers, "Viewer joined");
            return Ok(viewers);
        }
    }

    fn roll_back(
        &self,
        session: &SessionId,
        set: &SharedViewerSet,
        state: &mut ViewerSet,
        viewer: &ViewerId,
    ) {
        state.viewers.remove(viewer);
        if state.viewers.is_empty() {
            self.retire(session, set, state);
        }
    }

    /// Remove a viewer; returns the viewer counter after the call
    pub async fn leave(&self, session: &SessionId, viewer: &ViewerId) -> Result<u64, HubError> {
        loop {
            let Some(set) = self.sessions.get(session).map(|entry| entry.value().clone()) else {
                return self.viewer_count(session).await;
            };
            let mut state = set.lock().await;
            if state.retired {
                continue;
            }

            if !state.viewers.remove(viewer) {
                drop(state);
                return self.viewer_count(session).await;
            }

            let decremented = bounded(
                "decrement_viewers",
                self.store_timeout,
                self.store.decrement_viewers(session.as_str()),
            )
            .await;

            return match decremented {
                Ok(viewers) => {
                    if state.viewers.is_empty() {
                        self.retire(session, &set, &mut state);
                    }
                    tracing::debug!(session_id = %session, viewer = %viewer, viewers, "Viewer left");
                    Ok(viewers)
                }
                Err(e) => {
                    state.viewers.insert(viewer.clone());
                    Err(e)
                }
            };
        }
    }

    /// Discard the viewers of an ended broadcast; returns how many were tracked
    pub async fn end_session(&self, session: &SessionId) -> usize {
        let Some((_, set)) = self.sessions.remove(session) else {
            return 0;
        };
        let mut state = set.lock().await;
        state.retired = true;
        let discarded = state.viewers.len();
        state.viewers.clear();

        tracing::info!(session_id = %session, discarded, "Broadcast session ended");
        discarded
    }

    /// Number of distinct viewers tracked in memory
    pub async fn tracked(&self, session: &SessionId) -> usize {
        let Some(set) = self.sessions.get(session).map(|entry| entry.value().clone()) else {
            return 0;
        };
        let state = set.lock().await;
        if state.retired {
            0
        } else {
            state.viewers.len()
        }
    }

    pub async fn is_watching(&self, session: &SessionId, viewer: &ViewerId) -> bool {
        let Some(set) = self.sessions.get(session).map(|entry| entry.value().clone()) else {
            return false;
        };
        let state = set.lock().await;
        !state.retired && state.viewers.contains(viewer)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
