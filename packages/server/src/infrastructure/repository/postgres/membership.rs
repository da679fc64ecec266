//! PostgreSQL membership lookup.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{integer_id, persistence};
use crate::domain::{MembershipChecker, RepositoryError, RoomId, UserId};

/// `MembershipChecker` backed by the `room_members` table
#[derive(Debug, Clone)]
pub struct PgMembership {
    pool: PgPool,
}

impl PgMembership {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipChecker for PgMembership {
    async fn is_member(&self, room_id: &RoomId, user_id: &UserId) -> Result<bool, RepositoryError> {
        let (Some(room_key), Some(user_key)) =
            (integer_id(room_id.as_str()), integer_id(user_id.as_str()))
        else {
            return Ok(false);
        };

        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                 SELECT 1 FROM room_members \
                 WHERE room_id = $1 AND user_id = $2 \
             )",
        )
        .bind(room_key)
        .bind(user_key)
        .fetch_one(&self.pool)
        .await
        .map_err(persistence)
    }
}
