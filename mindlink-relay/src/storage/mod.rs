use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use mindlink_shared::errors::{AppError, AppResult, ErrorCode};

/// One persisted chat-room message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: i64,
    pub room: String,
    pub author: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Summary of a chat room for the room-listing endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room: String,
    pub message_count: usize,
    pub last_activity: DateTime<Utc>,
}

/// Persistence seam for the chat-room feature. The relational
/// implementation lives outside this service; the relay only needs
/// save/query. Synchronous by design — implementations are expected to be
/// cheap per call.
pub trait MessageStore: Send + Sync {
    fn save_message(&self, room: &str, author: &str, text: &str) -> AppResult<i64>;

    /// The most recent `limit` messages of a room, oldest first. Unknown
    /// rooms yield an empty history.
    fn get_messages(&self, room: &str, limit: usize) -> AppResult<Vec<StoredMessage>>;

    fn rooms(&self) -> AppResult<Vec<RoomSummary>>;
}

/// Process-local message store. History does not survive a restart, which
/// mirrors the rest of this service's session-scoped state.
pub struct InMemoryMessageStore {
    by_room: Mutex<HashMap<String, Vec<StoredMessage>>>,
    next_id: AtomicI64,
    max_message_len: usize,
}

impl InMemoryMessageStore {
    pub fn new(max_message_len: usize) -> Self {
        Self {
            by_room: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            max_message_len,
        }
    }
}

impl MessageStore for InMemoryMessageStore {
    fn save_message(&self, room: &str, author: &str, text: &str) -> AppResult<i64> {
        if text.len() > self.max_message_len {
            return Err(AppError::new(
                ErrorCode::MessageTooLong,
                format!("message exceeds {} bytes", self.max_message_len),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = StoredMessage {
            id,
            room: room.to_string(),
            author: author.to_string(),
            text: text.to_string(),
            sent_at: Utc::now(),
        };

        let mut by_room = self
            .by_room
            .lock()
            .map_err(|_| AppError::internal("message store lock poisoned"))?;
        by_room.entry(room.to_string()).or_default().push(message);
        Ok(id)
    }

    fn get_messages(&self, room: &str, limit: usize) -> AppResult<Vec<StoredMessage>> {
        let by_room = self
            .by_room
            .lock()
            .map_err(|_| AppError::internal("message store lock poisoned"))?;
        let messages = match by_room.get(room) {
            Some(messages) => {
                let skip = messages.len().saturating_sub(limit);
                messages[skip..].to_vec()
            }
            None => Vec::new(),
        };
        Ok(messages)
    }

    fn rooms(&self) -> AppResult<Vec<RoomSummary>> {
        let by_room = self
            .by_room
            .lock()
            .map_err(|_| AppError::internal("message store lock poisoned"))?;
        // Message ids strictly increase, so the last id orders rooms by
        // activity even when timestamps tie.
        let mut summaries: Vec<(i64, RoomSummary)> = by_room
            .iter()
            .filter_map(|(room, messages)| {
                let last = messages.last()?;
                Some((
                    last.id,
                    RoomSummary {
                        room: room.clone(),
                        message_count: messages.len(),
                        last_activity: last.sent_at,
                    },
                ))
            })
            .collect();
        summaries.sort_by(|x, y| y.0.cmp(&x.0));
        Ok(summaries.into_iter().map(|(_, s)| s).collect())
    }
}
