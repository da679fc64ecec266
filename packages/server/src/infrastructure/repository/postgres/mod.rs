//! PostgreSQL implementations of the durable collaborators.
//!
//! The schema belongs to the room-management service; this module only reads
//! and appends:
//!
//! ```text
//! users(id integer, name)
//! room_members(room_id integer, user_id integer, role)
//! chat_messages(id serial, room_id integer, user_id integer, message text,
//!               timestamp timestamptz default now())
//! ```
//!
//! Room and user ids travel as strings on the wire and are parsed into
//! integers before they are bound.

pub mod chat;
pub mod membership;

pub use chat::PgChatStore;
pub use membership::PgMembership;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::domain::RepositoryError;

/// Open a connection pool
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, RepositoryError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(persistence)
}

pub(crate) fn persistence(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Persistence(error.to_string())
}

/// Integer key of an id stored in an `integer` column, if it has one
pub(crate) fn integer_id(value: &str) -> Option<i32> {
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_id_parses_numeric_ids() {
        // テスト項目: 数字だけの ID は integer カラムの値に変換される
        // when (操作):
        let room = integer_id("42");
        let user = integer_id("-7");

        // then (期待する結果):
        assert_eq!(room, Some(42));
        assert_eq!(user, Some(-7));
    }

    #[test]
    fn test_integer_id_rejects_non_numeric_ids() {
        // テスト項目: 数字でない ID や integer の範囲外の ID は変換できない
        // when (操作):
        let text = integer_id("room-a");
        let too_large = integer_id("2147483648");

        // then (期待する結果):
        assert_eq!(text, None);
        assert_eq!(too_large, None);
    }
}
