//! UseCase: アイドル接続の監視
//!
//! 最終アクティビティ（参加、カーソル、選択、編集、user-active）から
//! 一定時間が経過したプレゼンスを退出扱いにし、user-left を通知する。
//! 既定では無効。トランスポートは閉じないため、退出させられた接続は
//! 再度 join-room するまでイベントを無視される。

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use crate::domain::{RoomRegistry, Timestamp};

use super::leave_room::LeaveRoomUseCase;

/// アイドル監視のユースケース
pub struct IdleWatchdog {
    registry: Arc<dyn RoomRegistry>,
    idle_timeout: Duration,
}

impl IdleWatchdog {
    pub fn new(registry: Arc<dyn RoomRegistry>, idle_timeout: Duration) -> Self {
        Self {
            registry,
            idle_timeout,
        }
    }

    /// `now` の時点でアイドルなプレゼンスを退出させる
    ///
    /// # Returns
    ///
    /// 退出させた接続数
    pub async fn sweep(&self, now: Timestamp) -> usize {
        let timeout_ms = i64::try_from(self.idle_timeout.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Timestamp::new(now.value().saturating_sub(timeout_ms));

        let leave = LeaveRoomUseCase::new(self.registry.clone());
        let mut evicted = 0;
        for (room_id, connection_id) in self.registry.idle_presences(cutoff).await {
            // 列挙後に活動を再開した接続は対象外
            let still_idle = self
                .registry
                .get_presence(&room_id, &connection_id)
                .await
                .is_some_and(|p| p.last_active_at < cutoff);
            if !still_idle {
                continue;
            }
            tracing::warn!(
                "Evicting '{}' from room '{}' after {:?} without activity",
                connection_id,
                room_id,
                self.idle_timeout
            );
            if leave.execute(&room_id, &connection_id).await.is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    /// 一定間隔で `sweep` を実行するタスクを起動する
    pub fn spawn(self) -> JoinHandle<()> {
        let period = (self.idle_timeout / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = self.sweep(Timestamp::now()).await;
                if evicted > 0 {
                    tracing::info!("Idle watchdog evicted {} connection(s)", evicted);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            Color, ConnectionId, OutboxReceiver, Presence, RoomId, ServerEvent, UserId, Username,
        },
        infrastructure::repository::InMemoryRoomRegistry,
    };
    use tokio::sync::mpsc;

    fn room() -> RoomId {
        RoomId::new("r1".to_string()).unwrap()
    }

    async fn join(
        registry: &Arc<InMemoryRoomRegistry>,
        connection: &str,
        joined_at: i64,
    ) -> (ConnectionId, OutboxReceiver) {
        let connection_id = ConnectionId::new(connection.to_string()).unwrap();
        let presence = Presence::new(
            connection_id.clone(),
            UserId::new(connection.to_string()).unwrap(),
            Username::new(connection.to_string()).unwrap(),
            Color::new("#111".to_string()).unwrap(),
            Timestamp::new(joined_at),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(&room(), presence, tx).await.unwrap();
        registry
            .finish_replay(&connection_id, Arc::new(ServerEvent::ChatHistory(vec![])), &[])
            .await;
        while rx.try_recv().is_ok() {}
        (connection_id, rx)
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_idle_presences() {
        // テスト項目: タイムアウトを超えたプレゼンスだけが退出させられ、残りの接続に user-left が届く
        // given (前提条件):
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let (idle, _rx_idle) = join(&registry, "idle", 1_000).await;
        let (_active, mut rx_active) = join(&registry, "active", 50_000).await;
        let watchdog = IdleWatchdog::new(registry.clone(), Duration::from_secs(30));

        // when (操作):
        let evicted = watchdog.sweep(Timestamp::new(60_000)).await;

        // then (期待する結果):
        assert_eq!(evicted, 1);
        assert!(registry.get_presence(&room(), &idle).await.is_none());
        let Ok(event) = rx_active.try_recv() else {
            panic!("remaining connection should be told about the eviction");
        };
        assert!(matches!(event.as_ref(), ServerEvent::UserLeft(left) if left.connection_id == "idle"));
    }

    #[tokio::test]
    async fn test_sweep_respects_recent_activity() {
        // テスト項目: 参加が古くても最近アクティビティがあれば退出させない
        // given (前提条件):
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let (a, _rx) = join(&registry, "a", 1_000).await;
        registry.touch(&room(), &a, Timestamp::new(55_000)).await;
        let watchdog = IdleWatchdog::new(registry.clone(), Duration::from_secs(30));

        // when (操作):
        let evicted = watchdog.sweep(Timestamp::new(60_000)).await;

        // then (期待する結果):
        assert_eq!(evicted, 0);
        assert!(registry.get_presence(&room(), &a).await.is_some());
    }
}
