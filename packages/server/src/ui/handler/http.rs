//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use codeshare_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::RoomId,
    infrastructure::dto::http::{ParticipantDetailDto, RoomDetailDto, RoomSummaryDto},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of live room sessions
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state
        .registry
        .list_rooms()
        .await
        .into_iter()
        .map(|room| RoomSummaryDto {
            id: room.id.into_string(),
            connections: room.connections,
            created_at: timestamp_to_rfc3339(room.created_at.value()),
        })
        .collect();

    Json(rooms)
}

/// Get the roster of a live room session by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    let room_id = RoomId::new(room_id).map_err(|_| StatusCode::NOT_FOUND)?;

    let mut presences = state.registry.list_presence(&room_id).await;
    // No presences means no session
    if presences.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    presences.sort_by(|a, b| {
        a.joined_at
            .cmp(&b.joined_at)
            .then_with(|| a.connection_id.as_str().cmp(b.connection_id.as_str()))
    });

    let room_detail = RoomDetailDto {
        id: room_id.into_string(),
        participants: presences
            .into_iter()
            .map(|p| ParticipantDetailDto {
                connection_id: p.connection_id.into_string(),
                user_id: p.user_id.into_string(),
                username: p.username.into_string(),
                color: p.color.into_string(),
                cursor: p.cursor,
                selection: p.selection,
                joined_at: timestamp_to_rfc3339(p.joined_at.value()),
                last_active_at: timestamp_to_rfc3339(p.last_active_at.value()),
            })
            .collect(),
    };

    Ok(Json(room_detail))
}
