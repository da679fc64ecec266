//! UseCase: ルーム参加処理
//!
//! メンバーシップ確認 → プレゼンス登録と参加通知 → チャット履歴の再送、の順に行う。
//! メンバーでなければセッションを作らず、ロスターも履歴も送らない。
//! 接続は同時に 1 つのルームにしか所属できないため、別のルームに参加済みなら先に退出させる。

use std::sync::Arc;

use crate::domain::{
    ChatStore, Color, ConnectionId, JoinSnapshot, MembershipChecker, Outbox, Presence, RoomId,
    RoomRegistry, Timestamp, UserId, Username,
};

use super::{
    chat_service::ChatService, error::JoinError, leave_room::LeaveRoomUseCase,
    presence_broadcaster::PresenceBroadcaster,
};

/// join-room の内容（検証済み）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: Username,
    /// クライアントが指定した色。未指定ならユーザー ID から決める
    pub color: Option<String>,
}

/// ルーム参加のユースケース
pub struct JoinRoomUseCase {
    registry: Arc<dyn RoomRegistry>,
    chat_store: Arc<dyn ChatStore>,
    membership: Arc<dyn MembershipChecker>,
    history_limit: usize,
}

impl JoinRoomUseCase {
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

    /// ルーム参加を実行
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 参加する接続の ID
    /// * `request` - join-room の内容
    /// * `outbox` - この接続への送信キュー
    ///
    /// # Returns
    ///
    /// * `Ok(JoinSnapshot)` - 参加成功。current-users と chat-history はキュー済み
    /// * `Err(JoinError)` - 参加失敗。何も登録されていない
    pub async fn execute(
        &self,
        connection_id: ConnectionId,
        request: JoinRequest,
        outbox: Outbox,
    ) -> Result<JoinSnapshot, JoinError> {
        let JoinRequest {
            room_id,
            user_id,
            username,
            color,
        } = request;

        // 1. メンバーシップ確認（確認できない場合も拒否）
        match self.membership.is_member(&room_id, &user_id).await {
            Ok(true) => {}
            Ok(false) => return Err(JoinError::AuthorizationDenied { room_id, user_id }),
            Err(source) => {
                return Err(JoinError::MembershipUnavailable {
                    room_id,
                    user_id,
                    source,
                });
            }
        }

        // 2. 別のルームにいれば退出（同じルームなら登録時に DuplicateConnection になる）
        if let Some(current) = self.registry.room_of(&connection_id).await
            && current != room_id
        {
            LeaveRoomUseCase::new(self.registry.clone())
                .execute(&current, &connection_id)
                .await;
        }

        // 3. 登録と参加通知
        let color = Color::or_default_for(color, &user_id);
        let presence = Presence::new(
            connection_id.clone(),
            user_id,
            username,
            color,
            Timestamp::now(),
        );
        let snapshot = PresenceBroadcaster::new(self.registry.clone())
            .announce_join(&room_id, presence, outbox)
            .await?;

        // 4. 本人にだけ履歴を再送
        let replayed = ChatService::new(self.registry.clone(), self.chat_store.clone())
            .replay_history(&room_id, &connection_id, self.history_limit)
            .await;

        tracing::info!(
            "'{}' joined room '{}' ({} peer(s), {} message(s) replayed{})",
            connection_id,
            room_id,
            snapshot.peers.len(),
            replayed,
            if snapshot.room_created {
                ", session created"
            } else {
                ""
            }
        );

        Ok(snapshot)
    }
}
