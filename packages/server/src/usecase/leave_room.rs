//! UseCase: ルーム退出処理
//!
//! 明示的な leave-room、トランスポートの切断、アイドル監視による退出で共通。
//! 同じ接続に対して何度呼ばれても 2 回目以降は何もしない。

use std::sync::Arc;

use crate::domain::{ConnectionId, Departure, RoomId, RoomRegistry};

use super::presence_broadcaster::PresenceBroadcaster;

/// ルーム退出のユースケース
pub struct LeaveRoomUseCase {
    registry: Arc<dyn RoomRegistry>,
}

impl LeaveRoomUseCase {
    pub fn new(registry: Arc<dyn RoomRegistry>) -> Self {
        Self { registry }
    }

    /// 指定したルームから接続を退出させる
    ///
    /// # Returns
    ///
    /// * `Some(Departure)` - 退出した
    /// * `None` - 接続はそのルームにいなかった
    pub async fn execute(&self, room_id: &RoomId, connection_id: &ConnectionId) -> Option<Departure> {
        let departure = PresenceBroadcaster::new(self.registry.clone())
            .announce_leave(room_id, connection_id)
            .await;

        match &departure {
            Some(departure) => {
                tracing::info!(
                    "'{}' ({}) left room '{}' ({} remaining)",
                    connection_id,
                    departure.presence.username,
                    room_id,
                    departure.remaining.len()
                );
                if departure.room_closed {
                    tracing::info!("Room session '{}' closed", room_id);
                }
            }
            None => tracing::debug!("'{}' was not in room '{}'", connection_id, room_id),
        }

        departure
    }

    /// 接続が現在いるルームから退出させる（切断時のクリーンアップ）
    pub async fn leave_current(&self, connection_id: &ConnectionId) -> Option<Departure> {
        let room_id = self.registry.room_of(connection_id).await?;
        self.execute(&room_id, connection_id).await
    }
}
