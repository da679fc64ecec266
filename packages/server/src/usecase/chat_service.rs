//! UseCase: ルームチャット
//!
//! メッセージは永続化が確定してからルーム全体（送信者自身を含む）へ配送する。
//! 永続化に失敗した場合は誰にも配送しない。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ChatService::send_message() / load_history() / replay_history()
//!
//! ### なぜこのテストが必要か
//! - 保存前にブロードキャストしてしまうと、保存に失敗したメッセージが表示される
//! - 履歴は挿入順（昇順）で、limit 件までであること
//!
//! ### どのような状況を想定しているか
//! - 正常系：送信と受信、履歴の再送
//! - 異常系：永続化の失敗（mockall のモックで再現）、未参加の接続からの送信

use std::sync::Arc;

use crate::domain::{
    ChatStore, ConnectionId, MessageContent, NewChatMessage, RepositoryError, RoomId,
    RoomRegistry, ServerEvent, event::ChatEntry,
};

use super::error::SendMessageError;

/// Number of messages replayed to a joiner when not configured
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// ルームチャットのユースケース
pub struct ChatService {
    registry: Arc<dyn RoomRegistry>,
    store: Arc<dyn ChatStore>,
}

impl ChatService {
    pub fn new(registry: Arc<dyn RoomRegistry>, store: Arc<dyn ChatStore>) -> Self {
        Self { registry, store }
    }

    /// メッセージを保存し、receive-message をルーム全体へ配送する
    ///
    /// # Returns
    ///
    /// * `Ok(ChatEntry)` - 保存・配送されたメッセージ
    /// * `Err(SendMessageError)` - 未参加、または永続化の失敗（配送なし）
    pub async fn send_message(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        content: MessageContent,
    ) -> Result<ChatEntry, SendMessageError> {
        let sender = self
            .registry
            .get_presence(room_id, connection_id)
            .await
            .ok_or_else(|| SendMessageError::NotJoined {
                room_id: room_id.clone(),
                connection_id: connection_id.clone(),
            })?;

        // 1. 永続化（ここで他のイベントが割り込むことは許容する）
        let persisted = self
            .store
            .insert(NewChatMessage {
                room_id: room_id.clone(),
                user_id: sender.user_id.clone(),
                author: sender.username.clone(),
                content: content.clone(),
            })
            .await
            .map_err(SendMessageError::Persistence)?;

        // 2. 確定後にルームの現在の接続全員へ配送
        let entry = ChatEntry {
            id: persisted.id,
            text: content.into_string(),
            author: sender.username.into_string(),
            timestamp: persisted.created_at.value(),
        };
        let targets = self.registry.list_connections(room_id).await;
        let delivered = self
            .registry
            .deliver(&targets, Arc::new(ServerEvent::ReceiveMessage(entry.clone())))
            .await;
        tracing::debug!(
            "Chat message {} in room '{}' delivered to {} connection(s)",
            entry.id,
            room_id,
            delivered
        );

        Ok(entry)
    }

    /// 直近 `limit` 件のメッセージを古い順で返す
    pub async fn load_history(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatEntry>, RepositoryError> {
        let messages = self.store.query_recent(room_id, limit).await?;
        Ok(messages.iter().map(ChatEntry::from).collect())
    }

    /// 参加したばかりの接続に chat-history を送り、保留中のイベントを解放する
    ///
    /// 履歴の読み込みに失敗しても参加自体は成立させ、空の履歴を送る。
    ///
    /// # Returns
    ///
    /// 再送したメッセージ数
    pub async fn replay_history(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        limit: usize,
    ) -> usize {
        let history = match self.load_history(room_id, limit).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("Failed to load chat history of room '{}': {}", room_id, e);
                Vec::new()
            }
        };

        let replayed_ids: Vec<i64> = history.iter().map(|entry| entry.id).collect();
        let count = history.len();
        let released = self
            .registry
            .finish_replay(
                connection_id,
                Arc::new(ServerEvent::ChatHistory(history)),
                &replayed_ids,
            )
            .await;
        if !released {
            tracing::debug!(
                "'{}' left room '{}' before its history was replayed",
                connection_id,
                room_id
            );
        }
        count
    }
}
