//! UseCase: プレゼンス通知
//!
//! 参加・退出・アクティビティをルーム内の他の接続へ通知する。
//! 通知対象は常に接続 ID で指定するため、同じユーザーの別タブにも届く。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - announce_join / announce_leave / announce_activity
//!
//! ### なぜこのテストが必要か
//! - user-joined が参加者本人に届かないこと
//! - user-left が退出者本人に届かず、以降のロスターに残らないこと
//! - user-active が送信元を含むルーム全体に届くこと

use std::sync::Arc;

use crate::domain::{
    ConnectionId, Departure, JoinSnapshot, Outbox, Presence, RegistryError, RoomId, RoomRegistry,
    ServerEvent, Timestamp,
    event::{PeerIdentity, UserActive, UserLeft},
};

/// プレゼンス通知のユースケース
pub struct PresenceBroadcaster {
    registry: Arc<dyn RoomRegistry>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<dyn RoomRegistry>) -> Self {
        Self { registry }
    }

    /// 参加者を登録し、既存の接続へ user-joined を送る
    ///
    /// 参加者本人への current-users はレジストリが登録と同時にキューへ積む。
    pub async fn announce_join(
        &self,
        room_id: &RoomId,
        presence: Presence,
        outbox: Outbox,
    ) -> Result<JoinSnapshot, RegistryError> {
        let identity = PeerIdentity::from(&presence);
        let snapshot = self.registry.register(room_id, presence, outbox).await?;

        let delivered = self
            .registry
            .deliver(&snapshot.peers, Arc::new(ServerEvent::UserJoined(identity)))
            .await;
        tracing::debug!(
            "Announced join in room '{}' to {} connection(s)",
            room_id,
            delivered
        );

        Ok(snapshot)
    }

    /// 参加者を登録解除し、残りの接続へ user-left を送る
    ///
    /// 既に解除済みの場合は何もせず `None` を返す。
    pub async fn announce_leave(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Option<Departure> {
        let departure = self.registry.unregister(room_id, connection_id).await?;

        let event = ServerEvent::UserLeft(UserLeft::from(&departure.presence));
        self.registry
            .deliver(&departure.remaining, Arc::new(event))
            .await;

        Some(departure)
    }

    /// 送信元を含むルーム全体へ user-active を送る
    ///
    /// userId はクライアントの申告ではなく、登録済みのプレゼンスから取る。
    /// 送信元がルームにいなければ何もしない。
    pub async fn announce_activity(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        timestamp: Timestamp,
    ) -> usize {
        let Some(fanout) = self
            .registry
            .touch(room_id, connection_id, Timestamp::now())
            .await
        else {
            tracing::debug!(
                "Ignoring user-active from '{}': not in room '{}'",
                connection_id,
                room_id
            );
            return 0;
        };

        let mut targets = fanout.targets;
        targets.push(fanout.sender.connection_id.clone());

        let event = ServerEvent::UserActive(UserActive {
            room_id: room_id.as_str().to_string(),
            user_id: fanout.sender.user_id.as_str().to_string(),
            timestamp: timestamp.value(),
        });
        self.registry.deliver(&targets, Arc::new(event)).await
    }
}
