//! Domain factories for creating domain entities and value objects.

use super::ConnectionId;

/// Factory for generating ConnectionId instances.
///
/// Connection ids are assigned by the server when a socket is accepted; the
/// client never chooses them.
pub struct ConnectionIdFactory;

impl ConnectionIdFactory {
    /// Generate a new ConnectionId with a random UUID v4.
    pub fn generate() -> ConnectionId {
        ConnectionId::from_uuid(uuid::Uuid::new_v4())
    }
}
