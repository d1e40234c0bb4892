use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use mindlink_shared::errors::AppResult;
use mindlink_shared::types::api::ApiResponse;

use crate::storage::{RoomSummary, StoredMessage};
use crate::AppState;

const MAX_HISTORY_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomSummary>,
}

// ---------------------------------------------------------------------------
// GET /api/messages/:room_id
// ---------------------------------------------------------------------------

pub async fn get_room_messages(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<ApiResponse<MessagesResponse>>> {
    let limit = query
        .limit
        .unwrap_or(state.config.history_limit)
        .min(MAX_HISTORY_LIMIT);
    let messages = state.messages.get_messages(&room_id, limit)?;
    Ok(Json(ApiResponse::ok(MessagesResponse { messages })))
}

// ---------------------------------------------------------------------------
// GET /api/rooms
// ---------------------------------------------------------------------------

pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<RoomsResponse>>> {
    let rooms = state.messages.rooms()?;
    Ok(Json(ApiResponse::ok(RoomsResponse { rooms })))
}
