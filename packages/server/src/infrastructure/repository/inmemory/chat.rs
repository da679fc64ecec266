//! In-memory chat store.
//!
//! Used when no database is configured and in tests. Messages live as long as
//! the process does.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ChatMessage, ChatStore, NewChatMessage, PersistedMessage, RepositoryError, RoomId, Timestamp,
};

#[derive(Default)]
struct ChatState {
    next_id: i64,
    rooms: HashMap<RoomId, Vec<ChatMessage>>,
}

/// In-memory `ChatStore` implementation
#[derive(Default)]
pub struct InMemoryChatStore {
    state: Arc<Mutex<ChatState>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages stored for a room
    pub async fn count(&self, room_id: &RoomId) -> usize {
        let state = self.state.lock().await;
        state.rooms.get(room_id).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn insert(&self, message: NewChatMessage) -> Result<PersistedMessage, RepositoryError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;

        let messages = state.rooms.entry(message.room_id.clone()).or_default();
        // The wall clock may step backwards; per-room order must not.
        let now = Timestamp::now();
        let created_at = match messages.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };

        messages.push(ChatMessage {
            id,
            room_id: message.room_id,
            user_id: message.user_id,
            author: message.author.into_string(),
            content: message.content.into_string(),
            created_at,
        });

        Ok(PersistedMessage { id, created_at })
    }

    async fn query_recent(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let state = self.state.lock().await;
        let messages = state
            .rooms
            .get(room_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageContent, UserId, Username};

    fn new_message(room: &str, text: &str) -> NewChatMessage {
        NewChatMessage {
            room_id: RoomId::new(room.to_string()).unwrap(),
            user_id: UserId::new("1".to_string()).unwrap(),
            author: Username::new("alice".to_string()).unwrap(),
            content: MessageContent::new(text.to_string()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_query_recent_returns_tail_in_insertion_order() {
        // テスト項目: 直近 N 件が挿入順（昇順）で返される
        // given (前提条件):
        let store = InMemoryChatStore::new();
        for i in 1..=5 {
            store.insert(new_message("r1", &format!("m{i}"))).await.unwrap();
        }

        // when (操作):
        let recent = store
            .query_recent(&RoomId::new("r1".to_string()).unwrap(), 3)
            .await
            .unwrap();

        // then (期待する結果):
        let texts: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m4", "m5"]);
        assert!(recent.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn test_query_recent_with_large_limit_returns_everything() {
        // テスト項目: limit が件数以上なら全件が欠落・重複なく返される
        // given (前提条件):
        let store = InMemoryChatStore::new();
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(store.insert(new_message("r1", &format!("m{i}"))).await.unwrap().id);
        }

        // when (操作):
        let recent = store
            .query_recent(&RoomId::new("r1".to_string()).unwrap(), 50)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(recent.iter().map(|m| m.id).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        // テスト項目: 別ルームのメッセージは履歴に含まれない
        // given (前提条件):
        let store = InMemoryChatStore::new();
        store.insert(new_message("r1", "hello")).await.unwrap();

        // when (操作):
        let other = store
            .query_recent(&RoomId::new("r2".to_string()).unwrap(), 50)
            .await
            .unwrap();

        // then (期待する結果):
        assert!(other.is_empty());
        assert_eq!(store.count(&RoomId::new("r1".to_string()).unwrap()).await, 1);
    }
}
