use std::collections::VecDeque;

use crate::models::{ConnectionId, WaitingEntry};

/// FIFO pool of participants waiting for a buddy. Strict arrival-order
/// pairing: mood and interest tags ride along for display but are never
/// used to filter, so nobody is skipped while an earlier arrival waits.
#[derive(Debug, Default)]
pub struct WaitingPool {
    entries: VecDeque<WaitingEntry>,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, replacing any previous entry for the same
    /// connection so duplicates never accumulate. Returns the pool size
    /// after insertion.
    pub fn push(&mut self, entry: WaitingEntry) -> usize {
        self.remove(entry.connection_id);
        self.entries.push_back(entry);
        self.entries.len()
    }

    /// Pop the earliest-arrived entry.
    pub fn pop_front(&mut self) -> Option<WaitingEntry> {
        self.entries.pop_front()
    }

    /// Remove the entry for `connection_id` if present. Returns whether an
    /// entry was removed.
    pub fn remove(&mut self, connection_id: ConnectionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.connection_id != connection_id);
        self.entries.len() != before
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries.iter().any(|e| e.connection_id == connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
