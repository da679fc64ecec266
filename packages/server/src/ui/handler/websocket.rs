//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::{
        ConnectionId, ConnectionIdFactory, Outbox, OutboxReceiver, ServerEvent, event::ErrorCode,
    },
    infrastructure::dto::websocket::{ClientCommand, encode_server_event, parse_client_command},
    ui::state::AppState,
    usecase::{
        ChatService, EditEventRelay, JoinError, JoinRequest, JoinRoomUseCase, LeaveRoomUseCase,
        PresenceBroadcaster, SendMessageError,
    },
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Connection ids are server-assigned; the client never chooses one.
    let connection_id = ConnectionIdFactory::generate();
    ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, connection_id: ConnectionId) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut rx): (Outbox, OutboxReceiver) = mpsc::unbounded_channel();
    tracing::info!("Connection '{}' opened", connection_id);

    // Spawn a task to write this connection's outbox to the socket, in order
    let writer_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match encode_server_event(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize {} for '{}': {}", event.name(), writer_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Spawn a task to handle this connection's events one at a time
    let session = ConnectionSession {
        state: state.clone(),
        connection_id: connection_id.clone(),
        outbox,
    };
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", session.connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => session.handle_text(text.as_str()).await,
                Message::Binary(_) => {
                    session.reply_error(ErrorCode::InvalidPayload, "binary frames are not supported");
                }
                Message::Close(_) => {
                    tracing::debug!("'{}' requested close", session.connection_id);
                    break;
                }
                // Ping/pong is handled by the WebSocket protocol
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // The transport is gone; leave whatever room the connection was in
    LeaveRoomUseCase::new(state.registry.clone())
        .leave_current(&connection_id)
        .await;
    tracing::info!("Connection '{}' closed", connection_id);
}

/// Per-connection dispatcher for inbound events
struct ConnectionSession {
    state: Arc<AppState>,
    connection_id: ConnectionId,
    outbox: Outbox,
}

impl ConnectionSession {
    async fn handle_text(&self, text: &str) {
        let command = match parse_client_command(text) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Rejected frame from '{}': {}", self.connection_id, e);
                self.reply_error(ErrorCode::InvalidPayload, e.to_string());
                return;
            }
        };
        tracing::debug!("'{}' sent {}", self.connection_id, command.name());

        let registry = self.state.registry.clone();
        match command {
            ClientCommand::Join {
                room_id,
                user_id,
                username,
                color,
            } => {
                self.join(JoinRequest {
                    room_id,
                    user_id,
                    username,
                    color,
                })
                .await;
            }
            ClientCommand::Leave { room_id } => {
                LeaveRoomUseCase::new(registry)
                    .execute(&room_id, &self.connection_id)
                    .await;
            }
            ClientCommand::MoveCursor { room_id, position } => {
                EditEventRelay::new(registry)
                    .relay_cursor(&room_id, &self.connection_id, position)
                    .await;
            }
            ClientCommand::ChangeSelection { room_id, selection } => {
                EditEventRelay::new(registry)
                    .relay_selection(&room_id, &self.connection_id, selection)
                    .await;
            }
            ClientCommand::ChangeCode {
                room_id,
                filename,
                changes,
            } => {
                EditEventRelay::new(registry)
                    .relay_code(&room_id, &self.connection_id, filename, changes)
                    .await;
            }
            ClientCommand::SendMessage { room_id, content } => {
                let chat = ChatService::new(registry, self.state.chat_store.clone());
                match chat.send_message(&room_id, &self.connection_id, content).await {
                    Ok(_) => {}
                    Err(e @ SendMessageError::NotJoined { .. }) => {
                        tracing::debug!("{}", e);
                        self.reply_error(ErrorCode::NotJoined, "join the room before chatting");
                    }
                    Err(e @ SendMessageError::Persistence(_)) => {
                        tracing::error!("{}", e);
                        self.reply_error(ErrorCode::MessageFailed, "message could not be saved");
                    }
                }
            }
            ClientCommand::Heartbeat { room_id, timestamp } => {
                PresenceBroadcaster::new(registry)
                    .announce_activity(&room_id, &self.connection_id, timestamp)
                    .await;
            }
        }
    }

    async fn join(&self, request: JoinRequest) {
        let usecase = JoinRoomUseCase::new(
            self.state.registry.clone(),
            self.state.chat_store.clone(),
            self.state.membership.clone(),
            self.state.history_limit,
        );

        match usecase
            .execute(self.connection_id.clone(), request, self.outbox.clone())
            .await
        {
            Ok(_) => {}
            Err(e @ JoinError::AuthorizationDenied { .. }) => {
                tracing::warn!("{}", e);
                self.reply_error(ErrorCode::AuthorizationDenied, "not a member of this room");
            }
            Err(e @ JoinError::MembershipUnavailable { .. }) => {
                tracing::error!("{}", e);
                self.reply_error(
                    ErrorCode::AuthorizationDenied,
                    "room membership could not be verified",
                );
            }
            // Already in this room: log and drop
            Err(JoinError::Registry(e)) => tracing::warn!("{}", e),
        }
    }

    fn reply_error(&self, code: ErrorCode, message: impl Into<String>) {
        let event = Arc::new(ServerEvent::error(code, message));
        if self.outbox.send(event).is_err() {
            tracing::debug!("Outbox of '{}' closed; dropping error reply", self.connection_id);
        }
    }
}
