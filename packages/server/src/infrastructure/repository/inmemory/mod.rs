//! In-memory implementations of the domain repositories.

pub mod chat;
pub mod membership;
pub mod registry;

pub use chat::InMemoryChatStore;
pub use membership::{AllowAllMembership, InMemoryMembership};
pub use registry::InMemoryRoomRegistry;
