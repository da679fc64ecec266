//! WebSocket message DTOs.
//!
//! Both directions share the `{"type": "<event-name>", "payload": {...}}`
//! envelope. Outbound events are wrapped in [`ServerMessage`]. Clients send `{"type": "<event-name>", "payload": {...}}` text frames.
//! Each frame is parsed into a [`ClientEvent`] with a fixed schema, then
//! validated into a [`ClientCommand`] built from domain value objects, so a
//! malformed payload is rejected here instead of leaking empty fields into
//! broadcasts.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::domain::{
    CursorPosition, FileName, MessageContent, RoomId, SelectionRange, ServerEvent, Timestamp,
    UserId, Username, ValueObjectError,
    event::{
        ChatEntry, CodeUpdate, CursorUpdate, ErrorReply, PeerIdentity, RosterEntry,
        SelectionUpdate, UserActive, UserLeft,
    },
};

/// Client → server events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(JoinRoomPayload),
    LeaveRoom(LeaveRoomPayload),
    CursorMove(CursorMovePayload),
    SelectionChange(SelectionChangePayload),
    CodeChange(CodeChangePayload),
    SendMessage(SendMessagePayload),
    UserActive(UserActivePayload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    #[serde(deserialize_with = "string_or_number")]
    pub room_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoomPayload {
    #[serde(deserialize_with = "string_or_number")]
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMovePayload {
    #[serde(deserialize_with = "string_or_number")]
    pub room_id: String,
    pub line: u32,
    pub column: u32,
}

/// Selection range as editors report it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionDto {
    #[serde(alias = "startLineNumber")]
    pub start_line: u32,
    pub start_column: u32,
    #[serde(alias = "endLineNumber")]
    pub end_line: u32,
    pub end_column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionChangePayload {
    #[serde(deserialize_with = "string_or_number")]
    pub room_id: String,
    /// `null` clears the selection
    pub selection: Option<SelectionDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChangePayload {
    #[serde(deserialize_with = "string_or_number")]
    pub room_id: String,
    pub filename: String,
    /// Entire new file content
    pub changes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[serde(deserialize_with = "string_or_number")]
    pub room_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivePayload {
    #[serde(deserialize_with = "string_or_number")]
    pub room_id: String,
    /// Ignored in favour of the identity the connection joined with
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub user_id: Option<String>,
    /// Client clock, Unix milliseconds
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A validated client event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Join {
        room_id: RoomId,
        user_id: UserId,
        username: Username,
        color: Option<String>,
    },
    Leave {
        room_id: RoomId,
    },
    MoveCursor {
        room_id: RoomId,
        position: CursorPosition,
    },
    ChangeSelection {
        room_id: RoomId,
        selection: Option<SelectionRange>,
    },
    ChangeCode {
        room_id: RoomId,
        filename: FileName,
        changes: String,
    },
    SendMessage {
        room_id: RoomId,
        content: MessageContent,
    },
    Heartbeat {
        room_id: RoomId,
        timestamp: Timestamp,
    },
}

impl ClientCommand {
    /// Wire name of the event the command came from
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join-room",
            Self::Leave { .. } => "leave-room",
            Self::MoveCursor { .. } => "cursor-move",
            Self::ChangeSelection { .. } => "selection-change",
            Self::ChangeCode { .. } => "code-change",
            Self::SendMessage { .. } => "send-message",
            Self::Heartbeat { .. } => "user-active",
        }
    }
}

/// Why an inbound frame was rejected
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid {event} payload: {source}")]
    Invalid {
        event: &'static str,
        #[source]
        source: ValueObjectError,
    },
}

impl TryFrom<ClientEvent> for ClientCommand {
    type Error = PayloadError;

    fn try_from(event: ClientEvent) -> Result<Self, Self::Error> {
        let name = event_name(&event);
        build_command(event).map_err(|source| PayloadError::Invalid {
            event: name,
            source,
        })
    }
}

/// Parse and validate one inbound text frame
pub fn parse_client_command(text: &str) -> Result<ClientCommand, PayloadError> {
    let event: ClientEvent = serde_json::from_str(text)?;
    ClientCommand::try_from(event)
}

fn event_name(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::JoinRoom(_) => "join-room",
        ClientEvent::LeaveRoom(_) => "leave-room",
        ClientEvent::CursorMove(_) => "cursor-move",
        ClientEvent::SelectionChange(_) => "selection-change",
        ClientEvent::CodeChange(_) => "code-change",
        ClientEvent::SendMessage(_) => "send-message",
        ClientEvent::UserActive(_) => "user-active",
    }
}

fn build_command(event: ClientEvent) -> Result<ClientCommand, ValueObjectError> {
    let command = match event {
        ClientEvent::JoinRoom(p) => ClientCommand::Join {
            room_id: RoomId::new(p.room_id)?,
            user_id: UserId::new(p.user_id)?,
            username: Username::new(p.username)?,
            color: p.color,
        },
        ClientEvent::LeaveRoom(p) => ClientCommand::Leave {
            room_id: RoomId::new(p.room_id)?,
        },
        ClientEvent::CursorMove(p) => ClientCommand::MoveCursor {
            room_id: RoomId::new(p.room_id)?,
            position: CursorPosition::new(p.line, p.column)?,
        },
        ClientEvent::SelectionChange(p) => ClientCommand::ChangeSelection {
            room_id: RoomId::new(p.room_id)?,
            selection: p
                .selection
                .map(|s| SelectionRange::new(s.start_line, s.start_column, s.end_line, s.end_column))
                .transpose()?,
        },
        ClientEvent::CodeChange(p) => ClientCommand::ChangeCode {
            room_id: RoomId::new(p.room_id)?,
            filename: FileName::new(p.filename)?,
            changes: p.changes,
        },
        ClientEvent::SendMessage(p) => ClientCommand::SendMessage {
            room_id: RoomId::new(p.room_id)?,
            content: MessageContent::new(p.message)?,
        },
        ClientEvent::UserActive(p) => ClientCommand::Heartbeat {
            room_id: RoomId::new(p.room_id)?,
            timestamp: p.timestamp.map(Timestamp::new).unwrap_or_else(Timestamp::now),
        },
    };
    Ok(command)
}

/// Ids arrive as strings or as integers depending on the client
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Integer(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::Text(s) => s,
            StringOrNumber::Integer(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}

/// Server → client wire envelope
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage<'a> {
    UserJoined(&'a PeerIdentity),
    CurrentUsers(&'a [RosterEntry]),
    ChatHistory(&'a [ChatEntry]),
    CursorUpdate(&'a CursorUpdate),
    SelectionUpdate(&'a SelectionUpdate),
    CodeUpdate(&'a CodeUpdate),
    ReceiveMessage(&'a ChatEntry),
    UserActive(&'a UserActive),
    UserLeft(&'a UserLeft),
    Error(&'a ErrorReply),
}

impl<'a> From<&'a ServerEvent> for ServerMessage<'a> {
    fn from(event: &'a ServerEvent) -> Self {
        match event {
            ServerEvent::UserJoined(p) => Self::UserJoined(p),
            ServerEvent::CurrentUsers(p) => Self::CurrentUsers(p),
            ServerEvent::ChatHistory(p) => Self::ChatHistory(p),
            ServerEvent::CursorUpdate(p) => Self::CursorUpdate(p),
            ServerEvent::SelectionUpdate(p) => Self::SelectionUpdate(p),
            ServerEvent::CodeUpdate(p) => Self::CodeUpdate(p),
            ServerEvent::ReceiveMessage(p) => Self::ReceiveMessage(p),
            ServerEvent::UserActive(p) => Self::UserActive(p),
            ServerEvent::UserLeft(p) => Self::UserLeft(p),
            ServerEvent::Error(p) => Self::Error(p),
        }
    }
}

/// Serialize one outbound event into a text frame
pub fn encode_server_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServerMessage::from(event))
}
