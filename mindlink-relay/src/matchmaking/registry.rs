use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::ConnectionId;

/// One live connection as the registry sees it.
#[derive(Debug, Clone)]
pub struct Participant {
    pub connection_id: ConnectionId,
    /// Chat display name, set by the first `join_room`. The matchmaking
    /// side carries its own per-entry snapshot instead.
    pub display_name: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// A chat room affected by a membership change, with its new member count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUpdate {
    pub room: String,
    pub count: usize,
}

/// Maps live connections to participant records and chat rooms to their
/// member sets. Pure bookkeeping: membership lives here as explicit
/// side-tables keyed by connection id, not as attributes scattered on the
/// transport object. Not persisted — live connections cannot survive a
/// process restart anyway.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Participant>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh connection identity.
    pub fn register(&mut self) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        self.connections.insert(
            connection_id,
            Participant {
                connection_id,
                display_name: None,
                connected_at: Utc::now(),
            },
        );
        connection_id
    }

    /// Tear down everything tracked for a connection and report the rooms
    /// it was in with their remaining member counts, so the caller can
    /// broadcast the updates. Idempotent: a second call finds nothing and
    /// returns an empty list.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Vec<RoomUpdate> {
        if let Some(p) = self.connections.remove(&connection_id) {
            tracing::debug!(
                connection_id = %p.connection_id,
                connected_at = %p.connected_at,
                "connection unregistered"
            );
        }

        let rooms = self.memberships.remove(&connection_id).unwrap_or_default();
        let mut updates = Vec::with_capacity(rooms.len());
        for room in rooms {
            let count = match self.rooms.get_mut(&room) {
                Some(members) => {
                    members.remove(&connection_id);
                    let count = members.len();
                    if count == 0 {
                        self.rooms.remove(&room);
                    }
                    count
                }
                None => 0,
            };
            updates.push(RoomUpdate { room, count });
        }
        updates
    }

    pub fn is_registered(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    pub fn set_display_name(&mut self, connection_id: ConnectionId, name: impl Into<String>) {
        if let Some(p) = self.connections.get_mut(&connection_id) {
            p.display_name = Some(name.into());
        }
    }

    pub fn display_name(&self, connection_id: ConnectionId) -> Option<String> {
        self.connections
            .get(&connection_id)?
            .display_name
            .clone()
    }

    /// Add the connection to a room. Returns the room's member count.
    pub fn join_room(&mut self, connection_id: ConnectionId, room: &str) -> usize {
        self.memberships
            .entry(connection_id)
            .or_default()
            .insert(room.to_string());
        let members = self.rooms.entry(room.to_string()).or_default();
        members.insert(connection_id);
        members.len()
    }

    /// Remove the connection from a room. Returns the new member count if
    /// the connection was actually a member.
    pub fn leave_room(&mut self, connection_id: ConnectionId, room: &str) -> Option<usize> {
        let was_member = self
            .memberships
            .get_mut(&connection_id)
            .map(|rooms| rooms.remove(room))
            .unwrap_or(false);
        if !was_member {
            return None;
        }
        let members = self.rooms.get_mut(room)?;
        members.remove(&connection_id);
        let count = members.len();
        if count == 0 {
            self.rooms.remove(room);
        }
        Some(count)
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_allocates_distinct_ids() {
        let mut reg = ConnectionRegistry::new();
        let a = reg.register();
        let b = reg.register();
        assert_ne!(a, b);
        assert!(reg.is_registered(a));
        assert!(reg.is_registered(b));
    }

    #[test]
    fn room_membership_counts() {
        let mut reg = ConnectionRegistry::new();
        let a = reg.register();
        let b = reg.register();
        assert_eq!(reg.join_room(a, "study"), 1);
        assert_eq!(reg.join_room(b, "study"), 2);
        // Joining twice does not double-count.
        assert_eq!(reg.join_room(a, "study"), 2);
        assert_eq!(reg.leave_room(a, "study"), Some(1));
        assert_eq!(reg.leave_room(a, "study"), None);
        assert_eq!(reg.room_size("study"), 1);
    }

    #[test]
    fn unregister_reports_affected_rooms_once() {
        let mut reg = ConnectionRegistry::new();
        let a = reg.register();
        let b = reg.register();
        reg.join_room(a, "study");
        reg.join_room(a, "mindfulness");
        reg.join_room(b, "study");

        let mut updates = reg.unregister(a);
        updates.sort_by(|x, y| x.room.cmp(&y.room));
        assert_eq!(
            updates,
            vec![
                RoomUpdate { room: "mindfulness".into(), count: 0 },
                RoomUpdate { room: "study".into(), count: 1 },
            ]
        );
        assert!(!reg.is_registered(a));

        // Double-disconnect delivery from the transport layer is harmless.
        assert!(reg.unregister(a).is_empty());
    }
}
