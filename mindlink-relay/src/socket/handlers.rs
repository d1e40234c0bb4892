use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use socketioxide::extract::{Data, SocketRef};

use crate::matchmaking::events::{Effects, Event, Outbound, ServerEvent, SignalKind};
use crate::matchmaking::monitor;
use crate::models::{ConnectionId, EndReason, MatchId, Mood};
use crate::socket::chat;
use crate::AppState;

// ---------------------------------------------------------------------------
// Inbound payload types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQueuePayload {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchActionPayload {
    pub match_id: MatchId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndMatchPayload {
    pub match_id: MatchId,
    #[serde(default)]
    pub reason: Option<EndReason>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEnvelope {
    pub match_id: MatchId,
    #[serde(default)]
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Connection handler
// ---------------------------------------------------------------------------

/// Socket.IO room used to deliver events to a single connection.
pub fn conn_room(connection_id: ConnectionId) -> String {
    format!("conn:{connection_id}")
}

pub async fn on_connect(socket: SocketRef, state: Arc<AppState>) {
    let connection_id = state.registry.lock().unwrap().register();
    socket.extensions.insert(connection_id);
    socket.join(conn_room(connection_id)).ok();

    tracing::info!(connection_id = %connection_id, sid = %socket.id, "socket connected");

    // Matchmaking + signaling
    socket.on("join_queue", {
        let state = state.clone();
        move |socket: SocketRef, Data::<serde_json::Value>(raw)| {
            let state = state.clone();
            async move { on_join_queue(socket, raw, &state).await }
        }
    });

    socket.on("cancel_queue", {
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                if let Some(connection_id) = get_connection_id(&socket) {
                    drive(&state, Event::CancelQueue { connection_id });
                }
            }
        }
    });

    socket.on("accept_match", {
        let state = state.clone();
        move |socket: SocketRef, Data::<MatchActionPayload>(payload)| {
            let state = state.clone();
            async move {
                if let Some(connection_id) = get_connection_id(&socket) {
                    drive(&state, Event::Accept { connection_id, match_id: payload.match_id });
                }
            }
        }
    });

    socket.on("reject_match", {
        let state = state.clone();
        move |socket: SocketRef, Data::<MatchActionPayload>(payload)| {
            let state = state.clone();
            async move {
                if let Some(connection_id) = get_connection_id(&socket) {
                    drive(&state, Event::Reject { connection_id, match_id: payload.match_id });
                }
            }
        }
    });

    socket.on("end_match", {
        let state = state.clone();
        move |socket: SocketRef, Data::<EndMatchPayload>(payload)| {
            let state = state.clone();
            async move {
                if let Some(connection_id) = get_connection_id(&socket) {
                    drive(
                        &state,
                        Event::End {
                            connection_id,
                            match_id: payload.match_id,
                            reason: payload.reason,
                        },
                    );
                }
            }
        }
    });

    socket.on("match_established", {
        let state = state.clone();
        move |socket: SocketRef, Data::<MatchActionPayload>(payload)| {
            let state = state.clone();
            async move {
                if let Some(connection_id) = get_connection_id(&socket) {
                    drive(&state, Event::Established { connection_id, match_id: payload.match_id });
                }
            }
        }
    });

    for kind in [SignalKind::Offer, SignalKind::Answer, SignalKind::Candidate] {
        socket.on(kind.event_name(), {
            let state = state.clone();
            move |socket: SocketRef, Data::<SignalEnvelope>(envelope)| {
                let state = state.clone();
                async move {
                    if let Some(connection_id) = get_connection_id(&socket) {
                        drive(
                            &state,
                            Event::Signal {
                                connection_id,
                                match_id: envelope.match_id,
                                kind,
                                payload: envelope.payload,
                            },
                        );
                    }
                }
            }
        });
    }

    // Chat rooms
    socket.on("join_room", {
        let state = state.clone();
        move |socket: SocketRef, Data::<chat::JoinRoomPayload>(payload)| {
            let state = state.clone();
            async move { chat::on_join_room(socket, payload, &state).await }
        }
    });

    socket.on("leave_room", {
        let state = state.clone();
        move |socket: SocketRef, Data::<chat::LeaveRoomPayload>(payload)| {
            let state = state.clone();
            async move { chat::on_leave_room(socket, payload, &state).await }
        }
    });

    socket.on("send_message", {
        let state = state.clone();
        move |socket: SocketRef, Data::<chat::SendMessagePayload>(payload)| {
            let state = state.clone();
            async move { chat::on_send_message(socket, payload, &state).await }
        }
    });

    socket.on(
        "typing",
        |socket: SocketRef, Data::<chat::TypingPayload>(payload)| async move {
            chat::on_typing(socket, payload, true).await
        },
    );

    socket.on(
        "stop_typing",
        |socket: SocketRef, Data::<chat::TypingPayload>(payload)| async move {
            chat::on_typing(socket, payload, false).await
        },
    );

    socket.on_disconnect({
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move { on_disconnect(socket, state).await }
        }
    });
}

// ---------------------------------------------------------------------------
// Event: join_queue
// ---------------------------------------------------------------------------

async fn on_join_queue(socket: SocketRef, raw: serde_json::Value, state: &Arc<AppState>) {
    let Some(connection_id) = get_connection_id(&socket) else {
        return;
    };

    let payload: JoinQueuePayload = match serde_json::from_value(raw) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "join_queue payload ignored");
            return;
        }
    };

    // Fall back to the identity collaborator when the client sent no name;
    // the coordinator itself defaults the rest.
    let display_name = payload
        .display_name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| state.identity.display_name(connection_id))
        .unwrap_or_default();

    drive(
        state,
        Event::JoinQueue {
            connection_id,
            display_name,
            mood: payload.mood,
            interests: payload.interests,
            at: Utc::now(),
        },
    );
}

// ---------------------------------------------------------------------------
// Disconnect handler
// ---------------------------------------------------------------------------

async fn on_disconnect(socket: SocketRef, state: Arc<AppState>) {
    let Some(connection_id) = get_connection_id(&socket) else {
        return;
    };

    tracing::info!(connection_id = %connection_id, sid = %socket.id, "socket disconnected");

    // Chat rooms first: the registry reports which rooms lost a member.
    let updates = state.registry.lock().unwrap().unregister(connection_id);
    for update in updates {
        let _ = state.io.to(update.room.clone()).emit(
            "room_users",
            &chat::RoomUsersPayload {
                room: update.room,
                count: update.count,
            },
        );
    }

    // Then the matchmaking side: queue entry and any live match.
    drive(&state, Event::Disconnect { connection_id });
}

// ---------------------------------------------------------------------------
// Effect application
// ---------------------------------------------------------------------------

/// Run one event through the coordinator and apply what it decided. The
/// lock is released before any emit happens.
pub fn drive(state: &Arc<AppState>, event: Event) {
    let effects = {
        let mut coordinator = state.coordinator.lock().unwrap();
        coordinator.handle(event)
    };
    apply_effects(state, effects);
}

pub fn apply_effects(state: &Arc<AppState>, effects: Effects) {
    for outbound in &effects.outbound {
        deliver(state, outbound);
    }
    monitor::apply(state, effects.timers);
}

/// Best-effort, exactly-once-per-call delivery: if the target connection is
/// gone its room is empty and the payload is simply lost.
fn deliver(state: &Arc<AppState>, outbound: &Outbound) {
    let op = state.io.to(conn_room(outbound.to));
    let name = outbound.event.event_name();
    let result = match &outbound.event {
        ServerEvent::QueueWaiting(p) => op.emit(name, p),
        ServerEvent::MatchFound(p) => op.emit(name, p),
        ServerEvent::PeerAccepted(p) => op.emit(name, p),
        ServerEvent::MatchReady(p) => op.emit(name, p),
        ServerEvent::MatchRejected(p) => op.emit(name, p),
        ServerEvent::MatchEnded(p) => op.emit(name, p),
        ServerEvent::Signal(_, p) => op.emit(name, p),
    };
    if let Err(e) = result {
        tracing::debug!(event = name, error = %e, "dropped outbound event");
    }
}

pub fn get_connection_id(socket: &SocketRef) -> Option<ConnectionId> {
    socket.extensions.get::<ConnectionId>()
}
