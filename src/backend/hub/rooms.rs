/**
 * Room Router
 *
 * Rooms are named fan-out groups of connections. Two kinds exist:
 *
 * - `conversation:<id>` - any connection may join
 * - `user:<uuid>` - the personal channel of one user; only that user's
 *   connections are members
 *
 * A room exists while it has members. Joining a missing room creates it and
 * the last leave destroys it, so rejoining always starts from an empty room.
 *
 * Membership is kept in both directions (room to connections, connection to
 * rooms) so that disconnect cleanup never scans every room.
 */

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::registry::SessionRegistry;
use crate::backend::error::HubError;
use crate::shared::event::HubEvent;
use crate::shared::identity::{ConnectionId, UserId};

const CONVERSATION_PREFIX: &str = "conversation:";
const PERSONAL_PREFIX: &str = "user:";
const MAX_IDENTIFIER_LEN: usize = 64;

/// 1 to 64 ASCII alphanumerics, `-` or `_`
pub(crate) fn is_valid_identifier(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= MAX_IDENTIFIER_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Validated room name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomName {
    Conversation(String),
    Personal(UserId),
}

impl RoomName {
    pub fn parse(raw: &str) -> Result<Self, HubError> {
        if let Some(id) = raw.strip_prefix(CONVERSATION_PREFIX) {
            return Self::conversation(id);
        }
        if let Some(id) = raw.strip_prefix(PERSONAL_PREFIX) {
            let user = uuid::Uuid::parse_str(id)
                .map_err(|_| HubError::invalid_room(format!("{} is not a user id", id)))?;
            return Ok(Self::Personal(user));
        }
        Err(HubError::invalid_room(format!("unknown room kind in {:?}", raw)))
    }

    pub fn conversation(id: &str) -> Result<Self, HubError> {
        if !is_valid_identifier(id) {
            return Err(HubError::invalid_room(format!("malformed conversation id {:?}", id)));
        }
        Ok(Self::Conversation(id.to_string()))
    }

    pub fn personal(user_id: UserId) -> Self {
        Self::Personal(user_id)
    }

    /// Owner of a personal room
    pub fn owner(&self) -> Option<UserId> {
        match self {
            Self::Personal(user) => Some(*user),
            Self::Conversation(_) => None,
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::Conversation(id) => Some(id),
            Self::Personal(_) => None,
        }
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversation(id) => write!(f, "{}{}", CONVERSATION_PREFIX, id),
            Self::Personal(user) => write!(f, "{}{}", PERSONAL_PREFIX, user),
        }
    }
}

impl FromStr for RoomName {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Room membership and fan-out
#[derive(Debug)]
pub struct RoomRouter {
    registry: Arc<SessionRegistry>,
    rooms: DashMap<RoomName, HashSet<ConnectionId>>,
    memberships: DashMap<ConnectionId, HashSet<RoomName>>,
    /// Users currently typing and the connection that wrote last
    typing: DashMap<(RoomName, UserId), ConnectionId>,
}

impl RoomRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            rooms: DashMap::new(),
            memberships: DashMap::new(),
            typing: DashMap::new(),
        }
    }

    /// Add a connection to a room; `false` if it was already a member
    pub fn join(&self, connection_id: ConnectionId, room: &RoomName) -> bool {
        let joined = self.rooms.entry(room.clone()).or_default().insert(connection_id);
        self.memberships
            .entry(connection_id)
            .or_default()
            .insert(room.clone());

        if joined {
            tracing::debug!(connection_id = %connection_id, room = %room, "Joined room");
        }
        joined
    }

    /// Remove a connection from a room; `false` if it was not a member
    pub fn leave(&self, connection_id: ConnectionId, room: &RoomName) -> bool {
        if let Entry::Occupied(mut rooms) = self.memberships.entry(connection_id) {
            rooms.get_mut().remove(room);
            if rooms.get().is_empty() {
                rooms.remove();
            }
        }

        let left = self.remove_member(room, connection_id);
        if left {
            tracing::debug!(connection_id = %connection_id, room = %room, "Left room");
        }
        left
    }

    /// Drop every membership of a connection, returning the rooms it was in
    pub fn leave_all(&self, connection_id: ConnectionId) -> Vec<RoomName> {
        let rooms: Vec<RoomName> = self
            .memberships
            .remove(&connection_id)
            .map(|(_, rooms)| rooms.into_iter().collect())
            .unwrap_or_default();

        for room in &rooms {
            self.remove_member(room, connection_id);
        }
        rooms
    }

    fn remove_member(&self, room: &RoomName, connection_id: ConnectionId) -> bool {
        match self.rooms.entry(room.clone()) {
            Entry::Occupied(mut members) => {
                let removed = members.get_mut().remove(&connection_id);
                if members.get().is_empty() {
                    members.remove();
                    tracing::debug!(room = %room, "Room emptied");
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }

    pub fn is_member(&self, connection_id: ConnectionId, room: &RoomName) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(&connection_id))
    }

    pub fn members(&self, room: &RoomName) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, connection_id: ConnectionId) -> Vec<RoomName> {
        self.memberships
            .get(&connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_exists(&self, room: &RoomName) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Deliver an event to every member; returns the number of deliveries
    pub fn broadcast(&self, room: &RoomName, event: &HubEvent) -> usize {
        self.fan_out(room, event, None)
    }

    /// Deliver an event to every member except `exclude`
    pub fn broadcast_except(
        &self,
        room: &RoomName,
        event: &HubEvent,
        exclude: ConnectionId,
    ) -> usize {
        self.fan_out(room, event, Some(exclude))
    }

    fn fan_out(&self, room: &RoomName, event: &HubEvent, exclude: Option<ConnectionId>) -> usize {
        // Copy the member list so no shard lock is held while sending
        let members = self.members(room);
        members
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .filter(|id| self.registry.send_to(*id, event.clone()))
            .count()
    }

    /// Record a typing state; `true` when the visible state changed
    pub fn set_typing(
        &self,
        room: &RoomName,
        user_id: UserId,
        connection_id: ConnectionId,
        is_typing: bool,
    ) -> bool {
        let key = (room.clone(), user_id);
        if is_typing {
            self.typing.insert(key, connection_id).is_none()
        } else {
            self.typing.remove(&key).is_some()
        }
    }

    pub fn is_typing(&self, room: &RoomName, user_id: UserId) -> bool {
        self.typing.contains_key(&(room.clone(), user_id))
    }

    /// Clear a user's typing mark in one room if `connection_id` wrote it
    pub fn clear_typing_in(
        &self,
        room: &RoomName,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> bool {
        self.typing
            .remove_if(&(room.clone(), user_id), |_, writer| *writer == connection_id)
            .is_some()
    }

    /// Clear typing marks last written by a connection
    pub fn clear_typing(&self, connection_id: ConnectionId) -> Vec<(RoomName, UserId)> {
        let keys: Vec<(RoomName, UserId)> = self
            .typing
            .iter()
            .filter(|mark| *mark.value() == connection_id)
            .map(|mark| mark.key().clone())
            .collect();

        keys.into_iter()
            .filter(|key| {
                self.typing
                    .remove_if(key, |_, writer| *writer == connection_id)
                    .is_some()
            })
            .collect()
    }
}
