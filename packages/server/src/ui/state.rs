//! Shared application state.

use std::sync::Arc;

use crate::{
    domain::{ChatStore, MembershipChecker, RoomRegistry},
    infrastructure::repository::{AllowAllMembership, InMemoryChatStore, InMemoryRoomRegistry},
    usecase::DEFAULT_HISTORY_LIMIT,
};

/// Shared application state
pub struct AppState {
    /// Live room sessions and presences
    pub registry: Arc<dyn RoomRegistry>,
    /// Durable chat storage
    pub chat_store: Arc<dyn ChatStore>,
    /// Room membership lookup consulted on join-room
    pub membership: Arc<dyn MembershipChecker>,
    /// Messages replayed to a joiner
    pub history_limit: usize,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        chat_store: Arc<dyn ChatStore>,
        membership: Arc<dyn MembershipChecker>,
        history_limit: usize,
    ) -> Self {
        Self {
            registry,
            chat_store,
            membership,
            history_limit,
        }
    }

    /// Process-local state: in-memory chat and every user admitted to every room
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryRoomRegistry::new()),
            Arc::new(InMemoryChatStore::new()),
            Arc::new(AllowAllMembership),
            DEFAULT_HISTORY_LIMIT,
        )
    }
}
