use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use socketioxide::extract::SocketRef;

use crate::socket::handlers::get_connection_id;
use crate::AppState;

const ANONYMOUS: &str = "Anonymous";

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JoinRoomPayload {
    pub room: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeaveRoomPayload {
    pub room: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub room: String,
    pub content: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TypingPayload {
    pub room: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoomUsersPayload {
    pub room: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct UserJoinedPayload {
    pub username: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessagePayload {
    pub id: i64,
    pub username: String,
    pub content: String,
    pub time: String,
    pub is_own: bool,
}

#[derive(Debug, Serialize)]
pub struct TypingOutPayload {
    pub username: String,
}

/// Room names with the reserved direct-delivery prefix would let a client
/// eavesdrop on another connection's private channel.
fn valid_room(room: &str) -> bool {
    !room.trim().is_empty() && !room.starts_with("conn:")
}

// ---------------------------------------------------------------------------
// Event: join_room
// ---------------------------------------------------------------------------

pub async fn on_join_room(socket: SocketRef, payload: JoinRoomPayload, state: &Arc<AppState>) {
    let Some(connection_id) = get_connection_id(&socket) else {
        return;
    };
    if !valid_room(&payload.room) {
        return;
    }

    let username = payload
        .username
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    let count = {
        let mut registry = state.registry.lock().unwrap();
        registry.set_display_name(connection_id, username.clone());
        registry.join_room(connection_id, &payload.room)
    };
    socket.join(payload.room.clone()).ok();

    tracing::info!(connection_id = %connection_id, room = %payload.room, count, "joined chat room");

    let _ = socket.to(payload.room.clone()).emit(
        "user_joined",
        &UserJoinedPayload {
            username: username.clone(),
            message: format!("{username} joined the chat"),
        },
    );
    let _ = state.io.to(payload.room.clone()).emit(
        "room_users",
        &RoomUsersPayload {
            room: payload.room,
            count,
        },
    );
}

// ---------------------------------------------------------------------------
// Event: leave_room
// ---------------------------------------------------------------------------

pub async fn on_leave_room(socket: SocketRef, payload: LeaveRoomPayload, state: &Arc<AppState>) {
    let Some(connection_id) = get_connection_id(&socket) else {
        return;
    };
    if !valid_room(&payload.room) {
        return;
    }

    socket.leave(payload.room.clone()).ok();
    let count = state
        .registry
        .lock()
        .unwrap()
        .leave_room(connection_id, &payload.room);

    if let Some(count) = count {
        let _ = state.io.to(payload.room.clone()).emit(
            "room_users",
            &RoomUsersPayload {
                room: payload.room,
                count,
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Event: send_message
// ---------------------------------------------------------------------------

pub async fn on_send_message(socket: SocketRef, payload: SendMessagePayload, state: &Arc<AppState>) {
    let Some(connection_id) = get_connection_id(&socket) else {
        return;
    };
    if !valid_room(&payload.room) || payload.content.is_empty() {
        return;
    }

    let author = payload
        .username
        .filter(|n| !n.trim().is_empty())
        .or_else(|| state.registry.lock().unwrap().display_name(connection_id))
        .unwrap_or_else(|| ANONYMOUS.to_string());

    // Persist through the collaborator store; history loss must not stop
    // the live broadcast (the original behaves the same way).
    let id = match state.messages.save_message(&payload.room, &author, &payload.content) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(room = %payload.room, error = %e, "failed to save message");
            Utc::now().timestamp_millis()
        }
    };

    let time = payload
        .time
        .unwrap_or_else(|| Utc::now().format("%-I:%M %p").to_string());

    // Sender already rendered its own copy locally.
    let _ = socket.to(payload.room.clone()).emit(
        "receive_message",
        &ReceiveMessagePayload {
            id,
            username: author,
            content: payload.content,
            time,
            is_own: false,
        },
    );
}

// ---------------------------------------------------------------------------
// Events: typing / stop_typing
// ---------------------------------------------------------------------------

pub async fn on_typing(socket: SocketRef, payload: TypingPayload, started: bool) {
    if !valid_room(&payload.room) {
        return;
    }
    let username = payload
        .username
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string());
    let event = if started { "user_typing" } else { "user_stopped_typing" };
    let _ = socket
        .to(payload.room)
        .emit(event, &TypingOutPayload { username });
}
