//! Domain layer error definitions.

use thiserror::Error;

use super::value_object::{ConnectionId, RoomId};

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    #[error("ConnectionId cannot be empty")]
    ConnectionIdEmpty,

    #[error("ConnectionId cannot exceed {max} characters (got {actual})")]
    ConnectionIdTooLong { max: usize, actual: usize },

    #[error("RoomId cannot be empty")]
    RoomIdEmpty,

    #[error("RoomId cannot exceed {max} characters (got {actual})")]
    RoomIdTooLong { max: usize, actual: usize },

    #[error("UserId cannot be empty")]
    UserIdEmpty,

    #[error("UserId cannot exceed {max} characters (got {actual})")]
    UserIdTooLong { max: usize, actual: usize },

    #[error("Username cannot be empty")]
    UsernameEmpty,

    #[error("Username cannot exceed {max} characters (got {actual})")]
    UsernameTooLong { max: usize, actual: usize },

    #[error("Color cannot be empty")]
    ColorEmpty,

    #[error("Color cannot exceed {max} characters (got {actual})")]
    ColorTooLong { max: usize, actual: usize },

    /// MessageContent validation error
    #[error("MessageContent cannot be empty")]
    MessageContentEmpty,

    /// MessageContent too long error
    #[error("MessageContent cannot exceed {max} characters (got {actual})")]
    MessageContentTooLong { max: usize, actual: usize },

    #[error("FileName cannot be empty")]
    FileNameEmpty,

    /// Editor coordinates are 1-based
    #[error("Position must be 1-based (got line {line}, column {column})")]
    PositionOutOfRange { line: u32, column: u32 },
}

/// Errors raised by the connection registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The connection is already registered in some room.
    ///
    /// The transport never reuses connection ids, so this is an invariant
    /// violation rather than a user error.
    #[error("Connection '{connection_id}' is already registered in room '{room_id}'")]
    DuplicateConnection {
        connection_id: ConnectionId,
        room_id: RoomId,
    },
}

/// Errors raised by durable collaborators (chat store, membership lookup)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The durable write or read failed
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// A stored row could not be mapped back into the domain model
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}
