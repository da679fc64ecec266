//! Core domain models for the relay.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::value_object::{
    Color, ConnectionId, CursorPosition, MessageContent, RoomId, SelectionRange, Timestamp,
    UserId, Username,
};

/// Live state of one connection inside a room.
///
/// Only events originating from the same connection mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub username: Username,
    pub color: Color,
    /// Last reported cursor, if the client has moved it since joining
    pub cursor: Option<CursorPosition>,
    /// Last reported selection; `None` once cleared
    pub selection: Option<SelectionRange>,
    pub joined_at: Timestamp,
    /// Last join, edit, cursor, selection or heartbeat from this connection
    pub last_active_at: Timestamp,
}

impl Presence {
    /// Create a presence record for a connection that is joining now
    pub fn new(
        connection_id: ConnectionId,
        user_id: UserId,
        username: Username,
        color: Color,
        joined_at: Timestamp,
    ) -> Self {
        Self {
            connection_id,
            user_id,
            username,
            color,
            cursor: None,
            selection: None,
            joined_at,
            last_active_at: joined_at,
        }
    }

    pub fn move_cursor(&mut self, position: CursorPosition, at: Timestamp) {
        self.cursor = Some(position);
        self.touch(at);
    }

    pub fn select(&mut self, selection: Option<SelectionRange>, at: Timestamp) {
        self.selection = selection;
        self.touch(at);
    }

    /// Record activity without changing editor state
    pub fn touch(&mut self, at: Timestamp) {
        if at > self.last_active_at {
            self.last_active_at = at;
        }
    }
}

/// In-memory session of a room: the presences of its live connections.
///
/// A session only exists while it has at least one presence; the registry
/// drops it as soon as the last connection leaves.
#[derive(Debug, Clone)]
pub struct RoomSession {
    pub id: RoomId,
    pub created_at: Timestamp,
    presences: HashMap<ConnectionId, Presence>,
}

impl RoomSession {
    /// Create an empty session
    pub fn new(id: RoomId, created_at: Timestamp) -> Self {
        Self {
            id,
            created_at,
            presences: HashMap::new(),
        }
    }

    /// Insert a presence, returning `false` if the connection was already present
    pub fn insert(&mut self, presence: Presence) -> bool {
        if self.presences.contains_key(&presence.connection_id) {
            return false;
        }
        self.presences
            .insert(presence.connection_id.clone(), presence);
        true
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<Presence> {
        self.presences.remove(connection_id)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<&Presence> {
        self.presences.get(connection_id)
    }

    pub fn get_mut(&mut self, connection_id: &ConnectionId) -> Option<&mut Presence> {
        self.presences.get_mut(connection_id)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.presences.contains_key(connection_id)
    }

    pub fn is_empty(&self) -> bool {
        self.presences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.presences.len()
    }

    pub fn presences(&self) -> impl Iterator<Item = &Presence> {
        self.presences.values()
    }

    /// Connection ids of every presence except `exclude`
    pub fn other_connections(&self, exclude: &ConnectionId) -> Vec<ConnectionId> {
        self.presences
            .keys()
            .filter(|id| *id != exclude)
            .cloned()
            .collect()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.presences.keys().cloned().collect()
    }
}

/// Summary of a live room session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub connections: usize,
    pub created_at: Timestamp,
}

/// A chat message about to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    pub room_id: RoomId,
    pub user_id: UserId,
    /// Display name of the author at send time
    pub author: Username,
    pub content: MessageContent,
}

/// Receipt returned by the chat store once a message is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedMessage {
    pub id: i64,
    pub created_at: Timestamp,
}

/// A persisted chat message joined with its author's display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub author: String,
    pub content: String,
    pub created_at: Timestamp,
}
