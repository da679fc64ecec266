//! Repository traits implemented by the infrastructure layer.
//!
//! The use cases depend only on these traits, so the in-memory registry can be
//! swapped for a shared backing store and the chat store for any database
//! without touching relay logic.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    entity::{ChatMessage, NewChatMessage, PersistedMessage, Presence, RoomSummary},
    error::{RegistryError, RepositoryError},
    event::{Outbox, ServerEvent},
    value_object::{ConnectionId, CursorPosition, RoomId, SelectionRange, Timestamp, UserId},
};

/// Result of registering a connection in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSnapshot {
    /// Presences of the room's other connections, taken right after the
    /// joiner was inserted
    pub roster: Vec<Presence>,
    /// Connections to announce the join to
    pub peers: Vec<ConnectionId>,
    /// Whether this join created the room session
    pub room_created: bool,
}

/// Result of removing a connection from its room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub presence: Presence,
    /// Connections still in the room after the removal
    pub remaining: Vec<ConnectionId>,
    /// Whether the removal destroyed the room session
    pub room_closed: bool,
}

/// A sender's current presence plus the connections to relay its event to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fanout {
    pub sender: Presence,
    pub targets: Vec<ConnectionId>,
}

/// Connection registry: room id → connection id → presence (+ outbox).
///
/// Every method is atomic with respect to every other method. Room sessions
/// are created by the first `register` and dropped by the `unregister` that
/// empties them.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Insert `presence` into `room_id`, creating the session if needed.
    ///
    /// `current-users` carrying the returned roster is queued on `outbox`
    /// before the new connection becomes reachable by any other fan-out, so a
    /// racing join's `user-joined` can never overtake the joiner's roster.
    ///
    /// Events delivered to the new connection afterwards are held back until
    /// [`RoomRegistry::finish_replay`] is called for it.
    ///
    /// # Errors
    ///
    /// `RegistryError::DuplicateConnection` if the connection is already
    /// registered in any room. Nothing is modified in that case.
    async fn register(
        &self,
        room_id: &RoomId,
        presence: Presence,
        outbox: Outbox,
    ) -> Result<JoinSnapshot, RegistryError>;

    /// Queue `replay` for a freshly registered connection, then release the
    /// events held since `register`. Held `receive-message` events whose id is
    /// in `replayed_message_ids` are dropped, so a message committed while the
    /// history was being read reaches the joiner exactly once.
    ///
    /// Returns `false` if the connection is no longer registered.
    async fn finish_replay(
        &self,
        connection_id: &ConnectionId,
        replay: Arc<ServerEvent>,
        replayed_message_ids: &[i64],
    ) -> bool;

    /// Remove a connection; `None` if it was not in `room_id`.
    async fn unregister(&self, room_id: &RoomId, connection_id: &ConnectionId)
    -> Option<Departure>;

    /// Store the sender's cursor; `None` if it is not in `room_id`.
    async fn update_cursor(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        position: CursorPosition,
        at: Timestamp,
    ) -> Option<Fanout>;

    /// Store or clear the sender's selection; `None` if it is not in `room_id`.
    async fn update_selection(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        selection: Option<SelectionRange>,
        at: Timestamp,
    ) -> Option<Fanout>;

    /// Record activity for the sender; `None` if it is not in `room_id`.
    async fn touch(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        at: Timestamp,
    ) -> Option<Fanout>;

    async fn get_presence(&self, room_id: &RoomId, connection_id: &ConnectionId)
    -> Option<Presence>;

    /// Snapshot of every presence in the room, in no particular order
    async fn list_presence(&self, room_id: &RoomId) -> Vec<Presence>;

    /// Every connection in the room except `exclude`
    async fn list_other_connections(
        &self,
        room_id: &RoomId,
        exclude: &ConnectionId,
    ) -> Vec<ConnectionId>;

    /// Every connection in the room
    async fn list_connections(&self, room_id: &RoomId) -> Vec<ConnectionId>;

    /// The room a connection is currently registered in
    async fn room_of(&self, connection_id: &ConnectionId) -> Option<RoomId>;

    /// Live room sessions
    async fn list_rooms(&self) -> Vec<RoomSummary>;

    /// Presences whose last activity is strictly before `cutoff`
    async fn idle_presences(&self, cutoff: Timestamp) -> Vec<(RoomId, ConnectionId)>;

    /// Queue `event` on each target's outbox, skipping connections that are
    /// gone or whose outbox is closed. Returns the number of deliveries,
    /// counting events held for a connection that is still replaying.
    async fn deliver(&self, targets: &[ConnectionId], event: Arc<ServerEvent>) -> usize;
}

/// Durable chat storage keyed by room
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist a message and return its id and server timestamp.
    ///
    /// Timestamps are non-decreasing per room in insertion order.
    async fn insert(&self, message: NewChatMessage) -> Result<PersistedMessage, RepositoryError>;

    /// Up to `limit` most recent messages of a room, oldest first
    async fn query_recent(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;
}

/// Room membership lookup owned by the room-management service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipChecker: Send + Sync {
    async fn is_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool, RepositoryError>;
}
