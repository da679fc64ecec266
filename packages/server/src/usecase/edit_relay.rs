//! UseCase: 編集イベントの中継
//!
//! cursor-move / selection-change / code-change を送信元の ID と色で
//! タグ付けし、同じルームの他の接続へそのまま中継する。
//!
//! code-change はファイル全体の置き換えであり、マージは行わない。
//! 同じファイルへの同時編集は、各受信側で最後に届いたものが勝つ。

use std::sync::Arc;

use crate::domain::{
    ConnectionId, CursorPosition, Fanout, FileName, RoomId, RoomRegistry, SelectionRange,
    ServerEvent, Timestamp,
    event::{CodeUpdate, CursorUpdate, PeerIdentity, SelectionUpdate},
};

/// 編集イベント中継のユースケース
pub struct EditEventRelay {
    registry: Arc<dyn RoomRegistry>,
}

impl EditEventRelay {
    pub fn new(registry: Arc<dyn RoomRegistry>) -> Self {
        Self { registry }
    }

    /// カーソル位置を保存し、cursor-update として中継する
    ///
    /// # Returns
    ///
    /// 配送できた接続数（送信元がルームにいなければ 0）
    pub async fn relay_cursor(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        position: CursorPosition,
    ) -> usize {
        let fanout = self
            .registry
            .update_cursor(room_id, connection_id, position, Timestamp::now())
            .await;
        self.fan_out(room_id, connection_id, fanout, |peer| {
            ServerEvent::CursorUpdate(CursorUpdate {
                peer,
                cursor: position,
            })
        })
        .await
    }

    /// 選択範囲を保存（`None` ならクリア）し、selection-update として中継する
    pub async fn relay_selection(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        selection: Option<SelectionRange>,
    ) -> usize {
        let fanout = self
            .registry
            .update_selection(room_id, connection_id, selection, Timestamp::now())
            .await;
        self.fan_out(room_id, connection_id, fanout, |peer| {
            ServerEvent::SelectionUpdate(SelectionUpdate { peer, selection })
        })
        .await
    }

    /// ファイル全体の内容を code-update として中継する
    ///
    /// ファイル名によるフィルタは行わない。表示していないファイルの更新を
    /// 捨てるのは受信側の責務。
    pub async fn relay_code(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        filename: FileName,
        changes: String,
    ) -> usize {
        let fanout = self
            .registry
            .touch(room_id, connection_id, Timestamp::now())
            .await;
        self.fan_out(room_id, connection_id, fanout, |peer| {
            ServerEvent::CodeUpdate(CodeUpdate {
                peer,
                filename: filename.into_string(),
                changes,
            })
        })
        .await
    }

    async fn fan_out<F>(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        fanout: Option<Fanout>,
        build: F,
    ) -> usize
    where
        F: FnOnce(PeerIdentity) -> ServerEvent,
    {
        // 退出後に遅れて届いたイベント
        let Some(fanout) = fanout else {
            tracing::debug!(
                "Ignoring edit event from '{}': not in room '{}'",
                connection_id,
                room_id
            );
            return 0;
        };

        let event = build(PeerIdentity::from(&fanout.sender));
        let name = event.name();
        let delivered = self
            .registry
            .deliver(&fanout.targets, Arc::new(event))
            .await;
        tracing::debug!(
            "Relayed {} from '{}' to {} connection(s) in room '{}'",
            name,
            connection_id,
            delivered,
            room_id
        );
        delivered
    }
}
