use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::models::MatchId;
use crate::AppState;

use super::events::{Event, TimerCommand};

/// Owns the per-match establishment deadline timers. Exactly one timer per
/// ready match: arming again replaces, every end path cancels. The expiry
/// decision itself lives in the coordinator — a fired timer only injects an
/// `EstablishDeadline` event back through the same lock as every other
/// event, so deadlines serialize with client traffic.
pub struct SessionMonitor {
    timers: DashMap<MatchId, JoinHandle<()>>,
    deadline: Duration,
}

impl SessionMonitor {
    pub fn new(deadline: Duration) -> Self {
        Self {
            timers: DashMap::new(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Register an armed timer task, replacing (and aborting) any previous
    /// timer for the same match.
    pub fn track(&self, match_id: MatchId, handle: JoinHandle<()>) {
        if let Some(previous) = self.timers.insert(match_id, handle) {
            previous.abort();
        }
    }

    /// Disarm the timer for a match, if one is armed. No-op otherwise, so
    /// end paths can cancel unconditionally.
    pub fn cancel(&self, match_id: MatchId) {
        if let Some((_, handle)) = self.timers.remove(&match_id) {
            handle.abort();
        }
    }

    /// Drop the table entry for a timer that just fired, without aborting
    /// the (currently running) task.
    pub fn clear_fired(&self, match_id: MatchId) {
        self.timers.remove(&match_id);
    }

    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }
}

/// Apply the timer commands a coordinator handler produced.
pub fn apply(state: &Arc<AppState>, commands: Vec<TimerCommand>) {
    for command in commands {
        match command {
            TimerCommand::Arm { match_id } => arm(state, match_id),
            TimerCommand::Cancel { match_id } => state.monitor.cancel(match_id),
        }
    }
}

fn arm(state: &Arc<AppState>, match_id: MatchId) {
    let deadline = state.monitor.deadline();
    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        // Remove our own entry first: the Cancel command this expiry
        // produces must not abort a live task.
        task_state.monitor.clear_fired(match_id);
        let effects = {
            let mut coordinator = task_state.coordinator.lock().unwrap();
            coordinator.handle(Event::EstablishDeadline { match_id })
        };
        crate::socket::handlers::apply_effects(&task_state, effects);
    });
    state.monitor.track(match_id, handle);
    tracing::debug!(match_id = %match_id, ?deadline, "establishment timer armed");
}
