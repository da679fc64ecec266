//! Shared fixtures for integration tests.
//!
//! `TestServer` runs the real router in-process on an ephemeral port;
//! `WsClient` speaks the `{"type", "payload"}` event protocol over
//! tokio-tungstenite.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use codeshare_server::ui::{AppState, serve};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    addr: SocketAddr,
    pub state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a server with in-memory stores that admits everyone
    pub async fn start() -> Self {
        Self::start_with(AppState::in_memory()).await
    }

    pub async fn start_with(state: AppState) -> Self {
        let state = Arc::new(state);
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_state = state.clone();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = serve(listener, server_state, shutdown).await {
                eprintln!("test server stopped with error: {e}");
            }
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Live room sessions as reported by the HTTP API
    pub async fn rooms(&self) -> Vec<Value> {
        reqwest::get(format!("{}/api/rooms", self.base_url()))
            .await
            .expect("Failed to send request")
            .json::<Vec<Value>>()
            .await
            .expect("Failed to parse JSON")
    }

    /// Poll the rooms endpoint until `predicate` holds
    pub async fn wait_for_rooms<F>(&self, predicate: F) -> Vec<Value>
    where
        F: Fn(&[Value]) -> bool,
    {
        for _ in 0..100 {
            let rooms = self.rooms().await;
            if predicate(&rooms) {
                return rooms;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("rooms never reached the expected state");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(server: &TestServer) -> Self {
        let (stream, _) = tokio_tungstenite::connect_async(server.ws_url())
            .await
            .expect("Failed to connect WebSocket");
        Self { stream }
    }

    /// Send a client event
    pub async fn emit(&mut self, event_type: &str, payload: Value) {
        let frame = json!({"type": event_type, "payload": payload}).to_string();
        self.send_raw(&frame).await;
    }

    pub async fn send_raw(&mut self, frame: &str) {
        self.stream
            .send(Message::Text(frame.to_string().into()))
            .await
            .expect("Failed to send frame");
    }

    /// Next server event as `(type, payload)`
    pub async fn recv(&mut self) -> (String, Value) {
        loop {
            let msg = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("Timed out waiting for a server event")
                .expect("Connection closed")
                .expect("WebSocket error");
            if let Message::Text(text) = msg {
                let mut event: Value =
                    serde_json::from_str(text.as_str()).expect("Server sent invalid JSON");
                let event_type = event["type"]
                    .as_str()
                    .expect("Event without type")
                    .to_string();
                return (event_type, event["payload"].take());
            }
        }
    }

    /// Next server event, which must be of `event_type`
    pub async fn expect(&mut self, event_type: &str) -> Value {
        let (actual, payload) = self.recv().await;
        assert_eq!(actual, event_type, "unexpected event, payload: {payload}");
        payload
    }

    /// Assert nothing arrives within `window`
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(Ok(msg))) = tokio::time::timeout(window, self.stream.next()).await {
            panic!("expected no event, got {msg:?}");
        }
    }

    /// Join a room and return `(current-users, chat-history)`
    pub async fn join(&mut self, room_id: &str, user_id: u64, username: &str) -> (Value, Value) {
        self.emit(
            "join-room",
            json!({
                "roomId": room_id,
                "userId": user_id,
                "username": username,
                "color": "#e06c75",
            }),
        )
        .await;
        let roster = self.expect("current-users").await;
        let history = self.expect("chat-history").await;
        (roster, history)
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
