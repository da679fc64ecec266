//! HTTP API response DTOs for live session introspection.

use serde::{Deserialize, Serialize};

use crate::domain::{CursorPosition, SelectionRange};

/// Room summary for list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub id: String,
    pub connections: usize,
    pub created_at: String, // RFC 3339
}

/// Room detail for detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub id: String,
    pub participants: Vec<ParticipantDetailDto>,
}

/// Participant detail for room detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDetailDto {
    pub connection_id: String,
    pub user_id: String,
    pub username: String,
    pub color: String,
    pub cursor: Option<CursorPosition>,
    pub selection: Option<SelectionRange>,
    pub joined_at: String,      // RFC 3339
    pub last_active_at: String, // RFC 3339
}
