//! PostgreSQL chat store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::{integer_id, persistence};
use crate::domain::{
    ChatMessage, ChatStore, NewChatMessage, PersistedMessage, RepositoryError, RoomId, Timestamp,
    UserId,
};

/// `ChatStore` backed by the `chat_messages` table
#[derive(Debug, Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn insert(&self, message: NewChatMessage) -> Result<PersistedMessage, RepositoryError> {
        let room_id = integer_id(message.room_id.as_str()).ok_or_else(|| {
            RepositoryError::Persistence(format!("room id '{}' is not an integer", message.room_id))
        })?;
        let user_id = integer_id(message.user_id.as_str()).ok_or_else(|| {
            RepositoryError::Persistence(format!("user id '{}' is not an integer", message.user_id))
        })?;

        let row = sqlx::query(
            "INSERT INTO chat_messages (room_id, user_id, message) VALUES ($1, $2, $3) \
             RETURNING CAST(id AS BIGINT) AS id, timestamp",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(message.content.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(persistence)?;

        let id: i64 = row.try_get("id").map_err(persistence)?;
        let created_at: DateTime<Utc> = row.try_get("timestamp").map_err(persistence)?;

        Ok(PersistedMessage {
            id,
            created_at: Timestamp::new(created_at.timestamp_millis()),
        })
    }

    async fn query_recent(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        // No integer key, no stored messages
        let Some(key) = integer_id(room_id.as_str()) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            "SELECT * FROM ( \
                 SELECT CAST(m.id AS BIGINT) AS id, m.user_id::text AS user_id, \
                        COALESCE(u.name, m.user_id::text) AS author, \
                        m.message AS message, m.timestamp AS timestamp \
                 FROM chat_messages m \
                 LEFT JOIN users u ON u.id = m.user_id \
                 WHERE m.room_id = $1 \
                 ORDER BY m.timestamp DESC, m.id DESC \
                 LIMIT $2 \
             ) recent \
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(key)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        rows.into_iter()
            .map(|row| -> Result<ChatMessage, RepositoryError> {
                let user_id: String = row.try_get("user_id").map_err(persistence)?;
                let created_at: DateTime<Utc> = row.try_get("timestamp").map_err(persistence)?;
                Ok(ChatMessage {
                    id: row.try_get("id").map_err(persistence)?,
                    room_id: room_id.clone(),
                    user_id: UserId::new(user_id)
                        .map_err(|e| RepositoryError::CorruptRecord(e.to_string()))?,
                    author: row.try_get("author").map_err(persistence)?,
                    content: row.try_get("message").map_err(persistence)?,
                    created_at: Timestamp::new(created_at.timestamp_millis()),
                })
            })
            .collect()
    }
}
