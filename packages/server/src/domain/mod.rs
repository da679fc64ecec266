//! Domain layer for the relay.
//!
//! This module contains the room/presence model, the outbound events
//! and the traits the use cases depend on. It knows nothing about WebSocket
//! framing or SQL.

pub mod entity;
pub mod error;
pub mod event;
pub mod factory;
pub mod repository;
pub mod value_object;

pub use entity::{
    ChatMessage, NewChatMessage, PersistedMessage, Presence, RoomSession, RoomSummary,
};
pub use error::{RegistryError, RepositoryError, ValueObjectError};
pub use event::{Outbox, OutboxReceiver, ServerEvent};
pub use factory::ConnectionIdFactory;
pub use repository::{
    ChatStore, Departure, Fanout, JoinSnapshot, MembershipChecker, RoomRegistry,
};
pub use value_object::{
    Color, ConnectionId, CursorPosition, FileName, MessageContent, RoomId, SelectionRange,
    Timestamp, UserId, Username,
};
