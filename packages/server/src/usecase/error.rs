//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{ConnectionId, RegistryError, RepositoryError, RoomId, UserId};

/// ルーム参加時のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// ユーザーがルームのメンバーではない
    #[error("User '{user_id}' is not a member of room '{room_id}'")]
    AuthorizationDenied { room_id: RoomId, user_id: UserId },

    /// メンバーシップを確認できなかった（拒否として扱う）
    #[error("Membership of user '{user_id}' in room '{room_id}' could not be verified: {source}")]
    MembershipUnavailable {
        room_id: RoomId,
        user_id: UserId,
        #[source]
        source: RepositoryError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// チャット送信時のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    /// 送信元の接続がルームに参加していない
    #[error("Connection '{connection_id}' has not joined room '{room_id}'")]
    NotJoined {
        room_id: RoomId,
        connection_id: ConnectionId,
    },

    /// 永続化に失敗した（ブロードキャストは行われない）
    #[error("Failed to persist chat message: {0}")]
    Persistence(#[source] RepositoryError),
}
