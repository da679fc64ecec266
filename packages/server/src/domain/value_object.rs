//! Value Objects for domain models.
//!
//! Value Objects are immutable objects that represent values in the domain.
//! They are compared by their value, not by identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ValueObjectError;

/// Maximum length of identifiers and display names.
pub const MAX_IDENTIFIER_LEN: usize = 100;

/// Maximum length of a display color string (e.g. `#ff8800`, `rgb(...)`).
pub const MAX_COLOR_LEN: usize = 32;

/// Maximum length of a chat message body.
pub const MAX_MESSAGE_LEN: usize = 10000;

/// Colors handed out when a client joins without choosing one.
const DEFAULT_PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#9a6324",
];

fn validate_identifier(
    value: &str,
    empty: ValueObjectError,
    too_long: fn(usize, usize) -> ValueObjectError,
) -> Result<(), ValueObjectError> {
    if value.trim().is_empty() {
        return Err(empty);
    }
    let len = value.chars().count();
    if len > MAX_IDENTIFIER_LEN {
        return Err(too_long(MAX_IDENTIFIER_LEN, len));
    }
    Ok(())
}

macro_rules! string_value_object {
    ($name:ident) => {
        impl $name {
            /// Get the inner string value.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert to owned String.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValueObjectError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value.to_string())
            }
        }
    };
}

/// Transport connection identifier.
///
/// Assigned by the server when a WebSocket is accepted; unique per connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new ConnectionId.
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        validate_identifier(&id, ValueObjectError::ConnectionIdEmpty, |max, actual| {
            ValueObjectError::ConnectionIdTooLong { max, actual }
        })?;
        Ok(Self(id))
    }

    /// Create a ConnectionId from a UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid.to_string())
    }
}

string_value_object!(ConnectionId);

/// Room identifier value object.
///
/// Opaque token naming a collaboration scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Create a new RoomId.
    ///
    /// # Arguments
    ///
    /// * `id` - The room identifier string
    ///
    /// # Returns
    ///
    /// A Result containing the RoomId or an error if validation fails
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        validate_identifier(&id, ValueObjectError::RoomIdEmpty, |max, actual| {
            ValueObjectError::RoomIdTooLong { max, actual }
        })?;
        Ok(Self(id))
    }
}

string_value_object!(RoomId);

/// Application-assigned user identifier.
///
/// Stable across connections; the same user may hold several connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId.
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        validate_identifier(&id, ValueObjectError::UserIdEmpty, |max, actual| {
            ValueObjectError::UserIdTooLong { max, actual }
        })?;
        Ok(Self(id))
    }
}

string_value_object!(UserId);

/// Display name shown next to cursors and chat messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// Create a new Username.
    pub fn new(name: String) -> Result<Self, ValueObjectError> {
        validate_identifier(&name, ValueObjectError::UsernameEmpty, |max, actual| {
            ValueObjectError::UsernameTooLong { max, actual }
        })?;
        Ok(Self(name))
    }
}

string_value_object!(Username);

/// Display color used to paint a user's cursor and selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(String);

impl Color {
    /// Create a new Color.
    pub fn new(color: String) -> Result<Self, ValueObjectError> {
        let len = color.chars().count();
        if len > MAX_COLOR_LEN {
            return Err(ValueObjectError::ColorTooLong {
                max: MAX_COLOR_LEN,
                actual: len,
            });
        }
        if color.trim().is_empty() {
            return Err(ValueObjectError::ColorEmpty);
        }
        Ok(Self(color))
    }

    /// Pick a palette color for a user who did not supply one.
    ///
    /// The choice depends only on the user id, so the same user keeps the
    /// same color across reconnects.
    pub fn default_for(user_id: &UserId) -> Self {
        let hash = user_id
            .as_str()
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        Self(DEFAULT_PALETTE[hash % DEFAULT_PALETTE.len()].to_string())
    }

    /// Use the client's color when it is present and valid, else the default.
    pub fn or_default_for(color: Option<String>, user_id: &UserId) -> Self {
        color
            .and_then(|c| Self::new(c).ok())
            .unwrap_or_else(|| Self::default_for(user_id))
    }
}

string_value_object!(Color);

/// Message content value object.
///
/// Represents the content of a chat message with validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent(String);

impl MessageContent {
    /// Create a new MessageContent.
    ///
    /// # Arguments
    ///
    /// * `content` - The message content string
    ///
    /// # Returns
    ///
    /// A Result containing the MessageContent or an error if validation fails
    pub fn new(content: String) -> Result<Self, ValueObjectError> {
        if content.trim().is_empty() {
            return Err(ValueObjectError::MessageContentEmpty);
        }
        let len = content.chars().count();
        if len > MAX_MESSAGE_LEN {
            return Err(ValueObjectError::MessageContentTooLong {
                max: MAX_MESSAGE_LEN,
                actual: len,
            });
        }
        Ok(Self(content))
    }
}

string_value_object!(MessageContent);

/// Path of a file inside the shared source tree, as the client names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileName(String);

impl FileName {
    /// Create a new FileName.
    pub fn new(name: String) -> Result<Self, ValueObjectError> {
        if name.trim().is_empty() {
            return Err(ValueObjectError::FileNameEmpty);
        }
        Ok(Self(name))
    }
}

string_value_object!(FileName);

/// Timestamp value object.
///
/// Represents a Unix timestamp in milliseconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a new Timestamp.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Current time.
    pub fn now() -> Self {
        Self(codeshare_shared::time::get_utc_timestamp())
    }

    /// Get the inner i64 value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cursor position in editor coordinates (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

impl CursorPosition {
    /// Create a new CursorPosition; both coordinates must be at least 1.
    pub fn new(line: u32, column: u32) -> Result<Self, ValueObjectError> {
        if line == 0 || column == 0 {
            return Err(ValueObjectError::PositionOutOfRange { line, column });
        }
        Ok(Self { line, column })
    }
}

/// Selected text range in editor coordinates (1-based, inclusive start).
///
/// The range is stored as the client reported it; a backwards selection
/// (end before start) is legal because the editor tracks selection direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRange {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SelectionRange {
    /// Create a new SelectionRange; every coordinate must be at least 1.
    pub fn new(
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Result<Self, ValueObjectError> {
        CursorPosition::new(start_line, start_column)?;
        CursorPosition::new(end_line, end_column)?;
        Ok(Self {
            start_line,
            start_column,
            end_line,
            end_column,
        })
    }

    /// Whether the range selects nothing.
    pub fn is_collapsed(&self) -> bool {
        self.start_line == self.end_line && self.start_column == self.end_column
    }
}
