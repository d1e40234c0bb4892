use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{
    ConnectionId, EndReason, Match, MatchId, MatchState, Mood, WaitingEntry,
};

use super::events::{
    Effects, Event, MatchEndedPayload, MatchFoundPayload, MatchReadyPayload, MatchRefPayload,
    QueueWaitingPayload, ServerEvent, SignalKind,
};
use super::pool::WaitingPool;
use super::signaling;

/// Fallback interest tag when a client declares none.
const DEFAULT_INTEREST: &str = "general";
const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// Owns the waiting pool and the active-match table and drives every
/// matchmaking state transition. One handler per event kind, each a pure
/// function of current state and event producing effects — no I/O, no
/// clock, no transport — so the race outcomes are decided purely by the
/// order events are handed in.
///
/// Stale references (a match id that is absent or already ended) are the
/// expected outcome of normal races and are ignored without error.
#[derive(Debug, Default)]
pub struct MatchCoordinator {
    pool: WaitingPool,
    matches: HashMap<MatchId, Match>,
    /// Index of each participant's single non-ended match.
    by_connection: HashMap<ConnectionId, MatchId>,
}

impl MatchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: Event) -> Effects {
        match event {
            Event::JoinQueue {
                connection_id,
                display_name,
                mood,
                interests,
                at,
            } => self.on_join_queue(connection_id, display_name, mood, interests, at),
            Event::CancelQueue { connection_id } => self.on_cancel_queue(connection_id),
            Event::Accept {
                connection_id,
                match_id,
            } => self.on_accept(connection_id, match_id),
            Event::Reject {
                connection_id,
                match_id,
            } => self.on_reject(connection_id, match_id),
            Event::End {
                connection_id,
                match_id,
                reason,
            } => self.on_end(connection_id, match_id, reason),
            Event::Established {
                connection_id,
                match_id,
            } => self.on_established(connection_id, match_id),
            Event::Signal {
                connection_id,
                match_id,
                kind,
                payload,
            } => self.on_signal(connection_id, match_id, kind, payload),
            Event::EstablishDeadline { match_id } => self.on_establish_deadline(match_id),
            Event::Disconnect { connection_id } => self.on_disconnect(connection_id),
        }
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    fn on_join_queue(
        &mut self,
        connection_id: ConnectionId,
        display_name: String,
        mood: Mood,
        interests: Vec<String>,
        at: DateTime<Utc>,
    ) -> Effects {
        // A participant already in a live match keeps exactly one match at
        // a time; they must end it before searching again.
        if self.by_connection.contains_key(&connection_id) {
            tracing::debug!(connection_id = %connection_id, "join_queue ignored: already in a match");
            return Effects::none();
        }

        let display_name = if display_name.trim().is_empty() {
            DEFAULT_DISPLAY_NAME.to_string()
        } else {
            display_name
        };
        let mut interests: Vec<String> = interests
            .into_iter()
            .filter(|tag| !tag.trim().is_empty())
            .collect();
        if interests.is_empty() {
            interests.push(DEFAULT_INTEREST.to_string());
        }

        let entry = WaitingEntry {
            connection_id,
            display_name,
            mood,
            interests,
            joined_at: at,
        };

        // Re-requesting while already waiting replaces the old entry.
        self.pool.remove(connection_id);

        match self.pool.pop_front() {
            Some(peer_entry) => self.pair(peer_entry, entry),
            None => {
                let queue_size = self.pool.push(entry);
                let mut effects = Effects::none();
                effects.send(
                    connection_id,
                    ServerEvent::QueueWaiting(QueueWaitingPayload { queue_size }),
                );
                effects
            }
        }
    }

    fn on_cancel_queue(&mut self, connection_id: ConnectionId) -> Effects {
        self.pool.remove(connection_id);
        Effects::none()
    }

    /// Pair the earliest waiter with the newcomer. Both learn the other's
    /// declared profile, never the other's connection id.
    fn pair(&mut self, earliest: WaitingEntry, newcomer: WaitingEntry) -> Effects {
        let m = Match::new(earliest, newcomer);
        let match_id = m.id;

        let mut effects = Effects::none();
        effects.send(
            m.a.connection_id,
            ServerEvent::MatchFound(MatchFoundPayload {
                match_id,
                peer: m.b.profile(),
            }),
        );
        effects.send(
            m.b.connection_id,
            ServerEvent::MatchFound(MatchFoundPayload {
                match_id,
                peer: m.a.profile(),
            }),
        );

        self.by_connection.insert(m.a.connection_id, match_id);
        self.by_connection.insert(m.b.connection_id, match_id);
        self.matches.insert(match_id, m);

        tracing::info!(match_id = %match_id, "match created");
        effects
    }

    // -----------------------------------------------------------------------
    // Consent
    // -----------------------------------------------------------------------

    fn on_accept(&mut self, connection_id: ConnectionId, match_id: MatchId) -> Effects {
        let Some(m) = self.matches.get_mut(&match_id) else {
            return Effects::none();
        };
        if !m.set_consent(connection_id) {
            return Effects::none();
        }

        let mut effects = Effects::none();
        if let Some(peer) = m.peer_of(connection_id) {
            effects.send(peer, ServerEvent::PeerAccepted(MatchRefPayload { match_id }));
        }

        // Double-accept re-notifies the peer but must not re-run the ready
        // transition or arm a second timer.
        if m.state == MatchState::PendingConsent && m.both_accepted() {
            m.state = MatchState::Ready;
            let initiator = m.initiator;
            for side in [m.a.connection_id, m.b.connection_id] {
                effects.send(
                    side,
                    ServerEvent::MatchReady(MatchReadyPayload {
                        match_id,
                        is_initiator: side == initiator,
                    }),
                );
            }
            effects.arm_timer(match_id);
            tracing::info!(match_id = %match_id, initiator = %initiator, "match ready");
        }
        effects
    }

    fn on_reject(&mut self, connection_id: ConnectionId, match_id: MatchId) -> Effects {
        let Some(m) = self.matches.get(&match_id) else {
            return Effects::none();
        };
        let Some(peer) = m.peer_of(connection_id) else {
            return Effects::none();
        };

        let mut effects = Effects::none();
        effects.send(peer, ServerEvent::MatchRejected(MatchRefPayload { match_id }));
        self.remove_match(match_id);
        effects.cancel_timer(match_id);
        tracing::info!(match_id = %match_id, reason = %EndReason::Rejected, "match ended");
        effects
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    fn on_end(
        &mut self,
        connection_id: ConnectionId,
        match_id: MatchId,
        reason: Option<EndReason>,
    ) -> Effects {
        let Some(m) = self.matches.get(&match_id) else {
            return Effects::none();
        };
        if !m.contains(connection_id) {
            return Effects::none();
        }

        let reason = reason.unwrap_or(EndReason::Ended);
        let sides = [m.a.connection_id, m.b.connection_id];
        let mut effects = Effects::none();
        for side in sides {
            effects.send(
                side,
                ServerEvent::MatchEnded(MatchEndedPayload { match_id, reason }),
            );
        }
        self.remove_match(match_id);
        effects.cancel_timer(match_id);
        tracing::info!(match_id = %match_id, reason = %reason, "match ended");
        effects
    }

    fn on_established(&mut self, connection_id: ConnectionId, match_id: MatchId) -> Effects {
        let Some(m) = self.matches.get_mut(&match_id) else {
            return Effects::none();
        };
        if !m.contains(connection_id) {
            return Effects::none();
        }
        // Confirmation only means something once signaling has begun.
        if !matches!(m.state, MatchState::Ready | MatchState::Connecting) {
            return Effects::none();
        }

        m.state = MatchState::Established;
        let mut effects = Effects::none();
        effects.cancel_timer(match_id);
        tracing::info!(match_id = %match_id, "transport established");
        effects
    }

    fn on_signal(
        &mut self,
        connection_id: ConnectionId,
        match_id: MatchId,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Effects {
        // Absent or ended match: the sender is racing a teardown, drop.
        let Some(m) = self.matches.get_mut(&match_id) else {
            return Effects::none();
        };
        let mut effects = Effects::none();
        if let Some((to, event)) = signaling::route(m, connection_id, kind, payload) {
            effects.send(to, event);
        }
        effects
    }

    fn on_establish_deadline(&mut self, match_id: MatchId) -> Effects {
        let Some(m) = self.matches.get(&match_id) else {
            // Timer raced an end event that already cleaned up.
            return Effects::none();
        };
        if m.state == MatchState::Established {
            return Effects::none();
        }

        let sides = [m.a.connection_id, m.b.connection_id];
        let mut effects = Effects::none();
        for side in sides {
            effects.send(
                side,
                ServerEvent::MatchEnded(MatchEndedPayload {
                    match_id,
                    reason: EndReason::Timeout,
                }),
            );
        }
        self.remove_match(match_id);
        effects.cancel_timer(match_id);
        tracing::info!(match_id = %match_id, reason = %EndReason::Timeout, "match ended");
        effects
    }

    fn on_disconnect(&mut self, connection_id: ConnectionId) -> Effects {
        self.pool.remove(connection_id);

        let mut effects = Effects::none();
        let active = self.by_connection.get(&connection_id).copied();
        if let Some(match_id) = active {
            if let Some(m) = self.matches.get(&match_id) {
                if let Some(peer) = m.peer_of(connection_id) {
                    effects.send(
                        peer,
                        ServerEvent::MatchEnded(MatchEndedPayload {
                            match_id,
                            reason: EndReason::PeerDisconnected,
                        }),
                    );
                }
            }
            self.remove_match(match_id);
            effects.cancel_timer(match_id);
            tracing::info!(match_id = %match_id, reason = %EndReason::PeerDisconnected, "match ended");
        }
        effects
    }

    // -----------------------------------------------------------------------
    // Internals / inspection
    // -----------------------------------------------------------------------

    fn remove_match(&mut self, match_id: MatchId) {
        if let Some(m) = self.matches.remove(&match_id) {
            self.by_connection.remove(&m.a.connection_id);
            self.by_connection.remove(&m.b.connection_id);
        }
    }

    pub fn waiting_count(&self) -> usize {
        self.pool.len()
    }

    pub fn is_waiting(&self, connection_id: ConnectionId) -> bool {
        self.pool.contains(connection_id)
    }

    pub fn active_match_of(&self, connection_id: ConnectionId) -> Option<MatchId> {
        self.by_connection.get(&connection_id).copied()
    }

    pub fn active_match_count(&self) -> usize {
        self.matches.len()
    }

    #[cfg(test)]
    pub(crate) fn match_state(&self, match_id: MatchId) -> Option<MatchState> {
        self.matches.get(&match_id).map(|m| m.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchmaking::events::TimerCommand;
    use uuid::Uuid;

    fn join(c: &mut MatchCoordinator, conn: ConnectionId) -> Effects {
        c.handle(Event::JoinQueue {
            connection_id: conn,
            display_name: format!("user-{}", conn.as_simple()),
            mood: Mood::Calm,
            interests: vec!["study".into()],
            at: Utc::now(),
        })
    }

    fn sent_to(effects: &Effects, to: ConnectionId) -> Vec<&ServerEvent> {
        effects
            .outbound
            .iter()
            .filter(|o| o.to == to)
            .map(|o| &o.event)
            .collect()
    }

    fn found_match_id(effects: &Effects) -> MatchId {
        effects
            .outbound
            .iter()
            .find_map(|o| match &o.event {
                ServerEvent::MatchFound(p) => Some(p.match_id),
                _ => None,
            })
            .expect("no match_found in effects")
    }

    /// Pair two connections and drive both accepts; returns the match id
    /// and the effects of the final accept (which carries match_ready).
    fn paired_and_ready(
        c: &mut MatchCoordinator,
        a: ConnectionId,
        b: ConnectionId,
    ) -> (MatchId, Effects) {
        join(c, a);
        let effects = join(c, b);
        let match_id = found_match_id(&effects);
        c.handle(Event::Accept { connection_id: a, match_id });
        let ready = c.handle(Event::Accept { connection_id: b, match_id });
        (match_id, ready)
    }

    #[test]
    fn first_join_waits_with_queue_size() {
        let mut c = MatchCoordinator::new();
        let a = Uuid::new_v4();
        let effects = join(&mut c, a);
        match sent_to(&effects, a).as_slice() {
            [ServerEvent::QueueWaiting(p)] => assert_eq!(p.queue_size, 1),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(c.is_waiting(a));
    }

    #[test]
    fn fifo_pairs_in_arrival_order() {
        let mut c = MatchCoordinator::new();
        let (a, b, x, y) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let effects = {
            join(&mut c, a);
            join(&mut c, b)
        };
        assert_eq!(sent_to(&effects, a).len(), 1);
        assert_eq!(sent_to(&effects, b).len(), 1);

        // The next pair forms independently, in arrival order.
        join(&mut c, x);
        let effects = join(&mut c, y);
        assert_eq!(sent_to(&effects, x).len(), 1);
        assert_eq!(sent_to(&effects, y).len(), 1);
        assert_eq!(c.waiting_count(), 0);
        assert_eq!(c.active_match_count(), 2);
    }

    #[test]
    fn rejoin_does_not_duplicate_queue_entry() {
        let mut c = MatchCoordinator::new();
        let a = Uuid::new_v4();
        join(&mut c, a);
        let effects = join(&mut c, a);
        match sent_to(&effects, a).as_slice() {
            [ServerEvent::QueueWaiting(p)] => assert_eq!(p.queue_size, 1),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(c.waiting_count(), 1);
    }

    #[test]
    fn cancel_queue_is_idempotent() {
        let mut c = MatchCoordinator::new();
        let a = Uuid::new_v4();
        join(&mut c, a);
        c.handle(Event::CancelQueue { connection_id: a });
        assert!(!c.is_waiting(a));
        // Cancelling again, or cancelling someone never queued, is a no-op.
        let effects = c.handle(Event::CancelQueue { connection_id: a });
        assert!(effects.outbound.is_empty());
    }

    #[test]
    fn empty_interests_default_to_general() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        c.handle(Event::JoinQueue {
            connection_id: a,
            display_name: "  ".into(),
            mood: Mood::Neutral,
            interests: vec!["".into()],
            at: Utc::now(),
        });
        let effects = join(&mut c, b);
        // b sees a's normalized profile.
        match sent_to(&effects, b).as_slice() {
            [ServerEvent::MatchFound(p)] => {
                assert_eq!(p.peer.interests, vec!["general".to_string()]);
                assert_eq!(p.peer.display_name, "Anonymous");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn join_while_in_match_is_ignored() {
        let mut c = MatchCoordinator::new();
        let (a, b, x) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        join(&mut c, a);
        join(&mut c, b);

        // a tries to search again while its match is still live.
        let effects = join(&mut c, a);
        assert!(effects.outbound.is_empty());
        assert!(!c.is_waiting(a));

        // A third participant therefore waits instead of pairing with a.
        let effects = join(&mut c, x);
        match sent_to(&effects, x).as_slice() {
            [ServerEvent::QueueWaiting(_)] => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn connection_never_in_two_live_matches() {
        let mut c = MatchCoordinator::new();
        let (a, b, x, y) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        join(&mut c, a);
        let first = found_match_id(&join(&mut c, b));
        join(&mut c, x);
        let second = found_match_id(&join(&mut c, y));
        assert_ne!(first, second);
        assert_eq!(c.active_match_of(a), Some(first));
        assert_eq!(c.active_match_of(y), Some(second));
    }

    #[test]
    fn match_found_carries_peer_profiles_not_ids() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        c.handle(Event::JoinQueue {
            connection_id: a,
            display_name: "night-owl".into(),
            mood: Mood::Anxious,
            interests: vec!["music".into(), "mindfulness".into()],
            at: Utc::now(),
        });
        let effects = c.handle(Event::JoinQueue {
            connection_id: b,
            display_name: "early-bird".into(),
            mood: Mood::Motivated,
            interests: vec!["fitness".into()],
            at: Utc::now(),
        });

        match sent_to(&effects, a).as_slice() {
            [ServerEvent::MatchFound(p)] => {
                assert_eq!(p.peer.display_name, "early-bird");
                assert_eq!(p.peer.mood, Mood::Motivated);
                assert_eq!(p.peer.interests, vec!["fitness".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        match sent_to(&effects, b).as_slice() {
            [ServerEvent::MatchFound(p)] => {
                assert_eq!(p.peer.display_name, "night-owl");
                assert_eq!(p.peer.mood, Mood::Anxious);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn accept_notifies_peer_then_both_ready() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        join(&mut c, a);
        let match_id = found_match_id(&join(&mut c, b));

        let effects = c.handle(Event::Accept { connection_id: a, match_id });
        match sent_to(&effects, b).as_slice() {
            [ServerEvent::PeerAccepted(p)] => assert_eq!(p.match_id, match_id),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(effects.timers.is_empty());

        let effects = c.handle(Event::Accept { connection_id: b, match_id });
        let ready_flags: Vec<bool> = effects
            .outbound
            .iter()
            .filter_map(|o| match &o.event {
                ServerEvent::MatchReady(p) => Some(p.is_initiator),
                _ => None,
            })
            .collect();
        assert_eq!(ready_flags.len(), 2);
        assert_eq!(ready_flags.iter().filter(|f| **f).count(), 1);
        assert_eq!(effects.timers, vec![TimerCommand::Arm { match_id }]);
        assert_eq!(c.match_state(match_id), Some(MatchState::Ready));
    }

    #[test]
    fn double_accept_renotifies_but_does_not_rearm() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (match_id, _) = paired_and_ready(&mut c, a, b);

        let effects = c.handle(Event::Accept { connection_id: a, match_id });
        match sent_to(&effects, b).as_slice() {
            [ServerEvent::PeerAccepted(_)] => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert!(effects.timers.is_empty());
        assert_eq!(c.match_state(match_id), Some(MatchState::Ready));
    }

    #[test]
    fn accept_from_stranger_is_ignored() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        join(&mut c, a);
        let match_id = found_match_id(&join(&mut c, b));
        let effects = c.handle(Event::Accept { connection_id: Uuid::new_v4(), match_id });
        assert!(effects.outbound.is_empty());
    }

    #[test]
    fn reject_notifies_peer_and_ends_match() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        join(&mut c, a);
        let match_id = found_match_id(&join(&mut c, b));

        let effects = c.handle(Event::Reject { connection_id: b, match_id });
        match sent_to(&effects, a).as_slice() {
            [ServerEvent::MatchRejected(p)] => assert_eq!(p.match_id, match_id),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(sent_to(&effects, b).is_empty());
        assert_eq!(effects.timers, vec![TimerCommand::Cancel { match_id }]);
        assert_eq!(c.active_match_count(), 0);
        assert_eq!(c.active_match_of(a), None);
    }

    #[test]
    fn accept_losing_race_against_reject_is_noop() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        join(&mut c, a);
        let match_id = found_match_id(&join(&mut c, b));

        // Both sides acted simultaneously; the reject was handled first.
        c.handle(Event::Reject { connection_id: b, match_id });
        let effects = c.handle(Event::Accept { connection_id: a, match_id });
        assert!(effects.outbound.is_empty());
        assert!(effects.timers.is_empty());
    }

    #[test]
    fn end_match_notifies_both_and_is_idempotent() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (match_id, _) = paired_and_ready(&mut c, a, b);

        let effects = c.handle(Event::End {
            connection_id: a,
            match_id,
            reason: None,
        });
        for side in [a, b] {
            match sent_to(&effects, side).as_slice() {
                [ServerEvent::MatchEnded(p)] => {
                    assert_eq!(p.match_id, match_id);
                    assert_eq!(p.reason, EndReason::Ended);
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert_eq!(effects.timers, vec![TimerCommand::Cancel { match_id }]);

        // The second call finds nothing: no duplicate notifications.
        let effects = c.handle(Event::End {
            connection_id: a,
            match_id,
            reason: None,
        });
        assert!(effects.outbound.is_empty());
        assert!(effects.timers.is_empty());
    }

    #[test]
    fn client_supplied_end_reason_is_forwarded() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (match_id, _) = paired_and_ready(&mut c, a, b);

        let effects = c.handle(Event::End {
            connection_id: b,
            match_id,
            reason: Some(EndReason::ConnectionFailed),
        });
        match sent_to(&effects, a).as_slice() {
            [ServerEvent::MatchEnded(p)] => assert_eq!(p.reason, EndReason::ConnectionFailed),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn deadline_times_out_unestablished_match() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (match_id, _) = paired_and_ready(&mut c, a, b);

        let effects = c.handle(Event::EstablishDeadline { match_id });
        for side in [a, b] {
            match sent_to(&effects, side).as_slice() {
                [ServerEvent::MatchEnded(p)] => assert_eq!(p.reason, EndReason::Timeout),
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert_eq!(c.active_match_count(), 0);
    }

    #[test]
    fn deadline_after_reject_is_noop() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        join(&mut c, a);
        let match_id = found_match_id(&join(&mut c, b));

        c.handle(Event::Reject { connection_id: a, match_id });
        let effects = c.handle(Event::EstablishDeadline { match_id });
        assert!(effects.outbound.is_empty());
        assert!(effects.timers.is_empty());
    }

    #[test]
    fn established_cancels_timer_and_survives_late_deadline() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (match_id, _) = paired_and_ready(&mut c, a, b);

        let effects = c.handle(Event::Established { connection_id: a, match_id });
        assert_eq!(effects.timers, vec![TimerCommand::Cancel { match_id }]);
        assert_eq!(c.match_state(match_id), Some(MatchState::Established));

        // A deadline that raced the confirmation must not kill the match.
        let effects = c.handle(Event::EstablishDeadline { match_id });
        assert!(effects.outbound.is_empty());
        assert_eq!(c.match_state(match_id), Some(MatchState::Established));
    }

    #[test]
    fn established_before_ready_is_ignored() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        join(&mut c, a);
        let match_id = found_match_id(&join(&mut c, b));

        let effects = c.handle(Event::Established { connection_id: a, match_id });
        assert!(effects.timers.is_empty());
        assert_eq!(c.match_state(match_id), Some(MatchState::PendingConsent));
    }

    #[test]
    fn disconnect_removes_waiting_entry_from_future_pairing() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        join(&mut c, a);
        c.handle(Event::Disconnect { connection_id: a });

        let effects = join(&mut c, b);
        match sent_to(&effects, b).as_slice() {
            [ServerEvent::QueueWaiting(_)] => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn disconnect_ends_match_and_notifies_peer_exactly_once() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (match_id, _) = paired_and_ready(&mut c, a, b);

        let effects = c.handle(Event::Disconnect { connection_id: a });
        match sent_to(&effects, b).as_slice() {
            [ServerEvent::MatchEnded(p)] => {
                assert_eq!(p.match_id, match_id);
                assert_eq!(p.reason, EndReason::PeerDisconnected);
            }
            other => panic!("unexpected: {other:?}"),
        }
        // The disconnected side gets nothing — it is gone.
        assert!(sent_to(&effects, a).is_empty());
        assert_eq!(effects.timers, vec![TimerCommand::Cancel { match_id }]);

        // Double-disconnect delivery is a no-op.
        let effects = c.handle(Event::Disconnect { connection_id: a });
        assert!(effects.outbound.is_empty());
        assert!(effects.timers.is_empty());
    }

    #[test]
    fn signal_to_ended_match_is_dropped() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (match_id, _) = paired_and_ready(&mut c, a, b);
        c.handle(Event::End { connection_id: a, match_id, reason: None });

        let effects = c.handle(Event::Signal {
            connection_id: b,
            match_id,
            kind: SignalKind::Answer,
            payload: serde_json::json!({"sdp": "v=0"}),
        });
        assert!(effects.outbound.is_empty());
    }

    #[test]
    fn every_end_path_cancels_the_timer() {
        for end in ["reject", "end", "deadline", "disconnect"] {
            let mut c = MatchCoordinator::new();
            let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
            let (match_id, ready) = paired_and_ready(&mut c, a, b);
            assert_eq!(ready.timers, vec![TimerCommand::Arm { match_id }]);

            let effects = match end {
                "reject" => c.handle(Event::Reject { connection_id: a, match_id }),
                "end" => c.handle(Event::End { connection_id: a, match_id, reason: None }),
                "deadline" => c.handle(Event::EstablishDeadline { match_id }),
                _ => c.handle(Event::Disconnect { connection_id: a }),
            };
            assert!(
                effects.timers.contains(&TimerCommand::Cancel { match_id }),
                "{end} did not cancel the establishment timer"
            );
            assert_eq!(c.active_match_count(), 0, "{end} left the match alive");
        }
    }

    /// The full happy path from the protocol description: queue, pair,
    /// consent, ready, offer relay.
    #[test]
    fn end_to_end_scenario() {
        let mut c = MatchCoordinator::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let effects = join(&mut c, a);
        assert!(matches!(
            sent_to(&effects, a).as_slice(),
            [ServerEvent::QueueWaiting(_)]
        ));

        let effects = join(&mut c, b);
        let id_for_a = match sent_to(&effects, a).as_slice() {
            [ServerEvent::MatchFound(p)] => p.match_id,
            other => panic!("unexpected: {other:?}"),
        };
        let id_for_b = match sent_to(&effects, b).as_slice() {
            [ServerEvent::MatchFound(p)] => p.match_id,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(id_for_a, id_for_b);
        let match_id = id_for_a;

        let effects = c.handle(Event::Accept { connection_id: a, match_id });
        assert!(matches!(
            sent_to(&effects, b).as_slice(),
            [ServerEvent::PeerAccepted(_)]
        ));

        let effects = c.handle(Event::Accept { connection_id: b, match_id });
        let mut initiator = None;
        for o in &effects.outbound {
            if let ServerEvent::MatchReady(p) = &o.event {
                assert_eq!(p.match_id, match_id);
                if p.is_initiator {
                    assert!(initiator.replace(o.to).is_none(), "two initiators");
                }
            }
        }
        let initiator = initiator.expect("no initiator designated");
        assert_eq!(initiator, a.min(b));

        let sdp = serde_json::json!({"type": "offer", "sdp": "v=0..."});
        let effects = c.handle(Event::Signal {
            connection_id: initiator,
            match_id,
            kind: SignalKind::Offer,
            payload: sdp.clone(),
        });
        let receiver = if initiator == a { b } else { a };
        match sent_to(&effects, receiver).as_slice() {
            [ServerEvent::Signal(SignalKind::Offer, p)] => {
                assert_eq!(p.match_id, match_id);
                assert_eq!(p.payload, sdp);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
