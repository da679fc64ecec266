//! In-memory connection registry.
//!
//! Implements the domain's `RoomRegistry` with two maps behind one async
//! mutex: room id → `RoomSession` and connection id → (room id, outbox).
//! Holding both under the same lock keeps the "one room per connection" and
//! "a session exists iff it is non-empty" invariants trivially consistent,
//! and makes every method atomic with respect to the others. Nothing awaits
//! while the lock is held.
//!
//! A freshly registered connection is in replay: fan-out to it is buffered
//! until the join flow has queued its chat history.
//!
//! Presence is process-local; a restart forgets every session.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ConnectionId, CursorPosition, Departure, Fanout, JoinSnapshot, Outbox, Presence,
    RegistryError, RoomId, RoomRegistry, RoomSession, RoomSummary, SelectionRange, ServerEvent,
    Timestamp, event::RosterEntry,
};

/// Registry entry of a live connection
struct Member {
    room_id: RoomId,
    outbox: Outbox,
    /// Events buffered while the chat history replay is pending
    held: Option<Vec<Arc<ServerEvent>>>,
}

impl Member {
    /// Queue or hold an event; `false` if the outbox is closed
    fn push(&mut self, event: Arc<ServerEvent>) -> bool {
        match self.held.as_mut() {
            Some(held) => {
                held.push(event);
                true
            }
            None => self.outbox.send(event).is_ok(),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    rooms: HashMap<RoomId, RoomSession>,
    connections: HashMap<ConnectionId, Member>,
}

impl RegistryState {
    /// Apply `update` to a presence and compute the fan-out targets in one step
    fn update_presence<F>(
        &mut self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        update: F,
    ) -> Option<Fanout>
    where
        F: FnOnce(&mut Presence),
    {
        let session = self.rooms.get_mut(room_id)?;
        let presence = session.get_mut(connection_id)?;
        update(presence);
        let sender = presence.clone();
        Some(Fanout {
            sender,
            targets: session.other_connections(connection_id),
        })
    }
}

/// In-memory `RoomRegistry` implementation
#[derive(Default)]
pub struct InMemoryRoomRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl InMemoryRoomRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    async fn register(
        &self,
        room_id: &RoomId,
        presence: Presence,
        outbox: Outbox,
    ) -> Result<JoinSnapshot, RegistryError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(member) = state.connections.get(&presence.connection_id) {
            return Err(RegistryError::DuplicateConnection {
                connection_id: presence.connection_id.clone(),
                room_id: member.room_id.clone(),
            });
        }

        let connection_id = presence.connection_id.clone();
        let room_created = !state.rooms.contains_key(room_id);
        let session = state
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| RoomSession::new(room_id.clone(), presence.joined_at));
        session.insert(presence);

        let roster: Vec<Presence> = session
            .presences()
            .filter(|p| p.connection_id != connection_id)
            .cloned()
            .collect();
        let peers = session.other_connections(&connection_id);

        // Queued before the outbox is published below; see the trait docs.
        let greeting = ServerEvent::CurrentUsers(roster.iter().map(RosterEntry::from).collect());
        if outbox.send(Arc::new(greeting)).is_err() {
            tracing::debug!(
                "Outbox of '{}' closed before its roster was queued",
                connection_id
            );
        }

        state.connections.insert(
            connection_id,
            Member {
                room_id: room_id.clone(),
                outbox,
                held: Some(Vec::new()),
            },
        );

        Ok(JoinSnapshot {
            roster,
            peers,
            room_created,
        })
    }

    async fn finish_replay(
        &self,
        connection_id: &ConnectionId,
        replay: Arc<ServerEvent>,
        replayed_message_ids: &[i64],
    ) -> bool {
        let mut state = self.state.lock().await;
        let Some(member) = state.connections.get_mut(connection_id) else {
            return false;
        };

        let held = member.held.take().unwrap_or_default();
        if member.outbox.send(replay).is_err() {
            tracing::debug!(
                "Outbox of '{}' is closed; dropping chat-history and {} held events",
                connection_id,
                held.len()
            );
            return true;
        }
        for event in held {
            if let ServerEvent::ReceiveMessage(entry) = event.as_ref()
                && replayed_message_ids.contains(&entry.id)
            {
                continue;
            }
            if member.outbox.send(event).is_err() {
                break;
            }
        }
        true
    }

    async fn unregister(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Option<Departure> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        match state.connections.get(connection_id) {
            Some(member) if &member.room_id == room_id => {}
            _ => return None,
        }
        state.connections.remove(connection_id);

        let session = state.rooms.get_mut(room_id)?;
        let presence = session.remove(connection_id)?;
        let remaining = session.connection_ids();
        let room_closed = session.is_empty();
        if room_closed {
            state.rooms.remove(room_id);
        }

        Some(Departure {
            presence,
            remaining,
            room_closed,
        })
    }

    async fn update_cursor(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        position: CursorPosition,
        at: Timestamp,
    ) -> Option<Fanout> {
        let mut state = self.state.lock().await;
        state.update_presence(room_id, connection_id, |p| p.move_cursor(position, at))
    }

    async fn update_selection(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        selection: Option<SelectionRange>,
        at: Timestamp,
    ) -> Option<Fanout> {
        let mut state = self.state.lock().await;
        state.update_presence(room_id, connection_id, |p| p.select(selection, at))
    }

    async fn touch(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        at: Timestamp,
    ) -> Option<Fanout> {
        let mut state = self.state.lock().await;
        state.update_presence(room_id, connection_id, |p| p.touch(at))
    }

    async fn get_presence(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Option<Presence> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_id)
            .and_then(|session| session.get(connection_id))
            .cloned()
    }

    async fn list_presence(&self, room_id: &RoomId) -> Vec<Presence> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_id)
            .map(|session| session.presences().cloned().collect())
            .unwrap_or_default()
    }

    async fn list_other_connections(
        &self,
        room_id: &RoomId,
        exclude: &ConnectionId,
    ) -> Vec<ConnectionId> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_id)
            .map(|session| session.other_connections(exclude))
            .unwrap_or_default()
    }

    async fn list_connections(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_id)
            .map(RoomSession::connection_ids)
            .unwrap_or_default()
    }

    async fn room_of(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        let state = self.state.lock().await;
        state
            .connections
            .get(connection_id)
            .map(|member| member.room_id.clone())
    }

    async fn list_rooms(&self) -> Vec<RoomSummary> {
        let state = self.state.lock().await;
        let mut rooms: Vec<RoomSummary> = state
            .rooms
            .values()
            .map(|session| RoomSummary {
                id: session.id.clone(),
                connections: session.len(),
                created_at: session.created_at,
            })
            .collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    async fn idle_presences(&self, cutoff: Timestamp) -> Vec<(RoomId, ConnectionId)> {
        let state = self.state.lock().await;
        state
            .rooms
            .values()
            .flat_map(|session| {
                session
                    .presences()
                    .filter(|p| p.last_active_at < cutoff)
                    .map(|p| (session.id.clone(), p.connection_id.clone()))
            })
            .collect()
    }

    async fn deliver(&self, targets: &[ConnectionId], event: Arc<ServerEvent>) -> usize {
        let mut state = self.state.lock().await;
        let mut delivered = 0;
        for target in targets {
            match state.connections.get_mut(target) {
                Some(member) => {
                    if member.push(event.clone()) {
                        delivered += 1
                    } else {
                        tracing::debug!(
                            "Outbox of '{}' is closed; dropping {}",
                            target,
                            event.name()
                        )
                    }
                }
                None => tracing::debug!("'{}' left before {} was delivered", target, event.name()),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Color, OutboxReceiver, UserId, Username,
        event::{ChatEntry, PeerIdentity},
    };
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 接続の登録・解除とルームセッションのライフサイクル
    // - カーソル・選択範囲の更新と、古いイベントの無視
    // - ファンアウト対象の計算と配送
    //
    // 【なぜこのテストが必要か】
    // - レジストリはプレゼンス状態を唯一所有するコンポーネント
    // - 「セッションが存在する ⇔ プレゼンスが 1 件以上」の不変条件を保証する必要がある
    // ========================================

    fn room(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    fn presence(connection: &str, user: &str) -> Presence {
        Presence::new(
            ConnectionId::new(connection.to_string()).unwrap(),
            UserId::new(user.to_string()).unwrap(),
            Username::new(format!("user-{user}")).unwrap(),
            Color::new("#abc".to_string()).unwrap(),
            Timestamp::new(1000),
        )
    }

    fn outbox() -> (Outbox, OutboxReceiver) {
        mpsc::unbounded_channel()
    }

    fn drain(rx: &mut OutboxReceiver) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push((*event).clone());
        }
        events
    }

    #[tokio::test]
    async fn test_register_creates_session_and_queues_empty_roster() {
        // テスト項目: 最初の登録でセッションが作成され、空のロスターが本人に送られる
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx, mut rx) = outbox();

        // when (操作):
        let snapshot = registry
            .register(&room("r1"), presence("a", "1"), tx)
            .await
            .unwrap();

        // then (期待する結果):
        assert!(snapshot.room_created);
        assert!(snapshot.roster.is_empty());
        assert!(snapshot.peers.is_empty());
        assert_eq!(drain(&mut rx), vec![ServerEvent::CurrentUsers(vec![])]);
        assert_eq!(registry.list_rooms().await.len(), 1);
    }

    #[tokio::test]
    async fn test_register_second_connection_sees_first_in_roster() {
        // テスト項目: 2 人目の登録ではロスターに 1 人目だけが含まれ、本人は含まれない
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx_a, _rx_a) = outbox();
        let (tx_b, mut rx_b) = outbox();
        let alice = presence("a", "1");
        registry
            .register(&room("r1"), alice.clone(), tx_a)
            .await
            .unwrap();

        // when (操作):
        let snapshot = registry
            .register(&room("r1"), presence("b", "2"), tx_b)
            .await
            .unwrap();

        // then (期待する結果):
        assert!(!snapshot.room_created);
        assert_eq!(snapshot.roster, vec![alice.clone()]);
        assert_eq!(snapshot.peers, vec![alice.connection_id.clone()]);
        assert_eq!(
            drain(&mut rx_b),
            vec![ServerEvent::CurrentUsers(vec![RosterEntry::from(&alice)])]
        );
    }

    #[tokio::test]
    async fn test_register_duplicate_connection_fails_anywhere() {
        // テスト項目: 同じ接続 ID は別のルームであっても二重登録できない
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx1, _rx1) = outbox();
        let (tx2, mut rx2) = outbox();
        registry
            .register(&room("r1"), presence("a", "1"), tx1)
            .await
            .unwrap();

        // when (操作):
        let result = registry.register(&room("r2"), presence("a", "1"), tx2).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RegistryError::DuplicateConnection {
                connection_id: ConnectionId::new("a".to_string()).unwrap(),
                room_id: room("r1"),
            })
        );
        assert!(drain(&mut rx2).is_empty());
        assert!(registry.list_presence(&room("r2")).await.is_empty());
        assert_eq!(registry.list_rooms().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_last_connection_destroys_session() {
        // テスト項目: 最後の接続が抜けるとセッションが削除される
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx, _rx) = outbox();
        let alice = presence("a", "1");
        registry
            .register(&room("r1"), alice.clone(), tx)
            .await
            .unwrap();

        // when (操作):
        let departure = registry
            .unregister(&room("r1"), &alice.connection_id)
            .await
            .unwrap();

        // then (期待する結果):
        assert!(departure.room_closed);
        assert!(departure.remaining.is_empty());
        assert_eq!(departure.presence, alice);
        assert!(registry.list_rooms().await.is_empty());
        assert!(registry.room_of(&alice.connection_id).await.is_none());
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        // テスト項目: 既に抜けた接続の解除はエラーにならず何もしない
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx_a, _rx_a) = outbox();
        let (tx_b, _rx_b) = outbox();
        let alice = presence("a", "1");
        registry
            .register(&room("r1"), alice.clone(), tx_a)
            .await
            .unwrap();
        registry
            .register(&room("r1"), presence("b", "2"), tx_b)
            .await
            .unwrap();
        registry.unregister(&room("r1"), &alice.connection_id).await;

        // when (操作):
        let again = registry.unregister(&room("r1"), &alice.connection_id).await;
        let wrong_room = registry
            .unregister(&room("r2"), &ConnectionId::new("b".to_string()).unwrap())
            .await;

        // then (期待する結果):
        assert!(again.is_none());
        assert!(wrong_room.is_none());
        assert_eq!(registry.list_presence(&room("r1")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_cursor_returns_fanout_and_updates_roster() {
        // テスト項目: カーソル更新で保存状態が変わり、送信元以外がファンアウト対象になる
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx_a, _rx_a) = outbox();
        let (tx_b, _rx_b) = outbox();
        let alice = presence("a", "1");
        let bob = presence("b", "2");
        registry
            .register(&room("r1"), alice.clone(), tx_a)
            .await
            .unwrap();
        registry
            .register(&room("r1"), bob.clone(), tx_b)
            .await
            .unwrap();

        // when (操作):
        let fanout = registry
            .update_cursor(
                &room("r1"),
                &alice.connection_id,
                CursorPosition::new(5, 3).unwrap(),
                Timestamp::new(2000),
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(fanout.targets, vec![bob.connection_id.clone()]);
        assert_eq!(fanout.sender.cursor, Some(CursorPosition { line: 5, column: 3 }));
        let stored = registry
            .get_presence(&room("r1"), &alice.connection_id)
            .await
            .unwrap();
        assert_eq!(stored.cursor, Some(CursorPosition { line: 5, column: 3 }));
        assert_eq!(stored.last_active_at, Timestamp::new(2000));
    }

    #[tokio::test]
    async fn test_update_for_stale_connection_is_noop() {
        // テスト項目: 登録されていない接続からの更新は何もせず None を返す
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx, _rx) = outbox();
        let alice = presence("a", "1");
        registry
            .register(&room("r1"), alice.clone(), tx)
            .await
            .unwrap();

        // when (操作):
        let other_room = registry
            .update_selection(
                &room("r2"),
                &alice.connection_id,
                None,
                Timestamp::new(2000),
            )
            .await;
        let unknown = registry
            .update_cursor(
                &room("r1"),
                &ConnectionId::new("ghost".to_string()).unwrap(),
                CursorPosition::new(1, 1).unwrap(),
                Timestamp::new(2000),
            )
            .await;

        // then (期待する結果):
        assert!(other_room.is_none());
        assert!(unknown.is_none());
        assert!(registry.list_presence(&room("r2")).await.is_empty());
    }

    #[tokio::test]
    async fn test_deliver_skips_gone_and_closed_outboxes() {
        // テスト項目: 退出済みや送信先が閉じた接続への配送はスキップされる
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx_a, mut rx_a) = outbox();
        let (tx_b, rx_b) = outbox();
        registry
            .register(&room("r1"), presence("a", "1"), tx_a)
            .await
            .unwrap();
        registry
            .register(&room("r1"), presence("b", "2"), tx_b)
            .await
            .unwrap();
        let a = ConnectionId::new("a".to_string()).unwrap();
        registry
            .finish_replay(&a, Arc::new(ServerEvent::ChatHistory(vec![])), &[])
            .await;
        drop(rx_b);
        drain(&mut rx_a);
        let event = Arc::new(ServerEvent::UserJoined(PeerIdentity {
            connection_id: "x".to_string(),
            user_id: "9".to_string(),
            username: "x".to_string(),
            color: "#000".to_string(),
        }));

        // when (操作):
        let delivered = registry
            .deliver(
                &[
                    ConnectionId::new("a".to_string()).unwrap(),
                    ConnectionId::new("b".to_string()).unwrap(),
                    ConnectionId::new("ghost".to_string()).unwrap(),
                ],
                event.clone(),
            )
            .await;

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut rx_a), vec![(*event).clone()]);
    }

    #[tokio::test]
    async fn test_events_are_held_until_replay_finishes() {
        // テスト項目: 履歴の再送が終わるまで新規接続への配送は保留され、再送済みのメッセージは重複しない
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx, mut rx) = outbox();
        let alice = presence("a", "1");
        registry
            .register(&room("r1"), alice.clone(), tx)
            .await
            .unwrap();
        let entry = |id: i64| ChatEntry {
            id,
            text: format!("m{id}"),
            author: "bob".to_string(),
            timestamp: 1000 + id,
        };
        let targets = [alice.connection_id.clone()];
        registry
            .deliver(&targets, Arc::new(ServerEvent::ReceiveMessage(entry(7))))
            .await;
        registry
            .deliver(&targets, Arc::new(ServerEvent::ReceiveMessage(entry(8))))
            .await;

        // when (操作):
        let before = drain(&mut rx);
        let released = registry
            .finish_replay(
                &alice.connection_id,
                Arc::new(ServerEvent::ChatHistory(vec![entry(6), entry(7)])),
                &[6, 7],
            )
            .await;

        // then (期待する結果):
        assert!(released);
        assert_eq!(before, vec![ServerEvent::CurrentUsers(vec![])]);
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerEvent::ChatHistory(vec![entry(6), entry(7)]),
                ServerEvent::ReceiveMessage(entry(8)),
            ]
        );
    }

    #[tokio::test]
    async fn test_finish_replay_on_closed_outbox_releases_the_hold() {
        // テスト項目: 送信先が閉じた接続でも再送完了は保留を解除し、以降の配送は数えられない
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx, rx) = outbox();
        let alice = presence("a", "1");
        registry
            .register(&room("r1"), alice.clone(), tx)
            .await
            .unwrap();
        let targets = [alice.connection_id.clone()];
        let held = registry
            .deliver(&targets, Arc::new(ServerEvent::ChatHistory(vec![])))
            .await;
        drop(rx);

        // when (操作):
        let released = registry
            .finish_replay(
                &alice.connection_id,
                Arc::new(ServerEvent::ChatHistory(vec![])),
                &[],
            )
            .await;
        let after = registry
            .deliver(&targets, Arc::new(ServerEvent::ChatHistory(vec![])))
            .await;

        // then (期待する結果):
        assert_eq!(held, 1);
        assert!(released);
        assert_eq!(after, 0);
    }

    #[tokio::test]
    async fn test_finish_replay_for_unknown_connection_returns_false() {
        // テスト項目: 既に退出した接続の再送完了は false を返す
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();

        // when (操作):
        let released = registry
            .finish_replay(
                &ConnectionId::new("ghost".to_string()).unwrap(),
                Arc::new(ServerEvent::ChatHistory(vec![])),
                &[],
            )
            .await;

        // then (期待する結果):
        assert!(!released);
    }

    #[tokio::test]
    async fn test_idle_presences_uses_last_activity() {
        // テスト項目: 最終アクティブ時刻が閾値より古いプレゼンスだけが返される
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let (tx_a, _rx_a) = outbox();
        let (tx_b, _rx_b) = outbox();
        let alice = presence("a", "1");
        let bob = presence("b", "2");
        registry
            .register(&room("r1"), alice.clone(), tx_a)
            .await
            .unwrap();
        registry
            .register(&room("r1"), bob.clone(), tx_b)
            .await
            .unwrap();
        registry
            .touch(&room("r1"), &bob.connection_id, Timestamp::new(9000))
            .await;

        // when (操作):
        let idle = registry.idle_presences(Timestamp::new(5000)).await;

        // then (期待する結果):
        assert_eq!(idle, vec![(room("r1"), alice.connection_id)]);
    }

    #[tokio::test]
    async fn test_join_leave_sequence_matches_model() {
        // テスト項目: 任意の参加・退出の列に対し、ライブなプレゼンス集合が「参加済みかつ未退出」の集合と一致する
        // given (前提条件):
        let registry = InMemoryRoomRegistry::new();
        let mut model: HashSet<String> = HashSet::new();
        let mut receivers = Vec::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;

        // when (操作): 疑似乱数で 200 回の参加・退出を行う
        for _ in 0..200 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let connection = format!("c{}", seed % 8);
            let connection_id = ConnectionId::new(connection.clone()).unwrap();
            if model.contains(&connection) {
                registry.unregister(&room("r1"), &connection_id).await.unwrap();
                model.remove(&connection);
            } else {
                let (tx, rx) = outbox();
                receivers.push(rx);
                registry
                    .register(&room("r1"), presence(&connection, "1"), tx)
                    .await
                    .unwrap();
                model.insert(connection);
            }

            // then (期待する結果):
            let live: HashSet<String> = registry
                .list_presence(&room("r1"))
                .await
                .into_iter()
                .map(|p| p.connection_id.into_string())
                .collect();
            assert_eq!(live, model);
            assert_eq!(
                registry.list_rooms().await.is_empty(),
                model.is_empty(),
                "session must exist exactly when the room is non-empty"
            );
        }
    }
}
