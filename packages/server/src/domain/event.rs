//! Events the relay sends to connections.
//!
//! The `{"type", "payload"}` envelope lives in
//! `infrastructure::dto::websocket::ServerMessage`; the payloads here carry
//! their camelCase field names.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::entity::{ChatMessage, Presence};
use super::value_object::{CursorPosition, SelectionRange};

/// Per-connection FIFO queue of outbound events.
///
/// Events are shared behind `Arc` so a fan-out to N peers serializes one
/// value, not N copies of a possibly large file buffer.
pub type Outbox = mpsc::UnboundedSender<Arc<ServerEvent>>;

/// Receiving half of an [`Outbox`].
pub type OutboxReceiver = mpsc::UnboundedReceiver<Arc<ServerEvent>>;

/// Server → client events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    UserJoined(PeerIdentity),
    CurrentUsers(Vec<RosterEntry>),
    ChatHistory(Vec<ChatEntry>),
    CursorUpdate(CursorUpdate),
    SelectionUpdate(SelectionUpdate),
    CodeUpdate(CodeUpdate),
    ReceiveMessage(ChatEntry),
    UserActive(UserActive),
    UserLeft(UserLeft),
    Error(ErrorReply),
}

/// Identity every relayed event is tagged with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerIdentity {
    pub connection_id: String,
    pub user_id: String,
    pub username: String,
    pub color: String,
}

impl From<&Presence> for PeerIdentity {
    fn from(presence: &Presence) -> Self {
        Self {
            connection_id: presence.connection_id.as_str().to_string(),
            user_id: presence.user_id.as_str().to_string(),
            username: presence.username.as_str().to_string(),
            color: presence.color.as_str().to_string(),
        }
    }
}

/// One entry of the `current-users` roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    #[serde(flatten)]
    pub peer: PeerIdentity,
    pub cursor: Option<CursorPosition>,
    pub selection: Option<SelectionRange>,
}

impl From<&Presence> for RosterEntry {
    fn from(presence: &Presence) -> Self {
        Self {
            peer: PeerIdentity::from(presence),
            cursor: presence.cursor,
            selection: presence.selection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdate {
    #[serde(flatten)]
    pub peer: PeerIdentity,
    pub cursor: CursorPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionUpdate {
    #[serde(flatten)]
    pub peer: PeerIdentity,
    /// `None` means the sender cleared its selection
    pub selection: Option<SelectionRange>,
}

/// Whole-file replacement relayed verbatim to the other connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeUpdate {
    #[serde(flatten)]
    pub peer: PeerIdentity,
    pub filename: String,
    /// Entire new file content
    pub changes: String,
}

/// A chat message as shown in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub id: i64,
    pub text: String,
    /// Author display name
    pub author: String,
    /// Unix milliseconds, server-assigned
    pub timestamp: i64,
}

impl From<&ChatMessage> for ChatEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id,
            text: message.content.clone(),
            author: message.author.clone(),
            timestamp: message.created_at.value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActive {
    pub room_id: String,
    pub user_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft {
    pub connection_id: String,
    pub user_id: String,
    pub username: String,
}

impl From<&Presence> for UserLeft {
    fn from(presence: &Presence) -> Self {
        Self {
            connection_id: presence.connection_id.as_str().to_string(),
            user_id: presence.user_id.as_str().to_string(),
            username: presence.username.as_str().to_string(),
        }
    }
}

/// Error codes reported to the offending connection only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    InvalidPayload,
    AuthorizationDenied,
    MessageFailed,
    NotJoined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReply {
    pub code: ErrorCode,
    pub message: String,
}

impl ServerEvent {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorReply {
            code,
            message: message.into(),
        })
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserJoined(_) => "user-joined",
            Self::CurrentUsers(_) => "current-users",
            Self::ChatHistory(_) => "chat-history",
            Self::CursorUpdate(_) => "cursor-update",
            Self::SelectionUpdate(_) => "selection-update",
            Self::CodeUpdate(_) => "code-update",
            Self::ReceiveMessage(_) => "receive-message",
            Self::UserActive(_) => "user-active",
            Self::UserLeft(_) => "user-left",
            Self::Error(_) => "error",
        }
    }
}
