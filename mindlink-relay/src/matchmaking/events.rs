use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ConnectionId, EndReason, MatchId, Mood, PeerProfile};

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// Every state transition in the matchmaking core is triggered by one of
/// these. The socket layer translates wire events into this enum; the
/// monitor injects `EstablishDeadline` when a ready-match timer fires.
/// Handlers run to completion one at a time, so event ordering alone
/// decides every race.
#[derive(Debug, Clone)]
pub enum Event {
    JoinQueue {
        connection_id: ConnectionId,
        display_name: String,
        mood: Mood,
        interests: Vec<String>,
        at: DateTime<Utc>,
    },
    CancelQueue {
        connection_id: ConnectionId,
    },
    Accept {
        connection_id: ConnectionId,
        match_id: MatchId,
    },
    Reject {
        connection_id: ConnectionId,
        match_id: MatchId,
    },
    End {
        connection_id: ConnectionId,
        match_id: MatchId,
        reason: Option<EndReason>,
    },
    Established {
        connection_id: ConnectionId,
        match_id: MatchId,
    },
    Signal {
        connection_id: ConnectionId,
        match_id: MatchId,
        kind: SignalKind,
        payload: serde_json::Value,
    },
    EstablishDeadline {
        match_id: MatchId,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
}

/// The three payload kinds the relay ferries between matched peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

impl SignalKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Offer => "signal_offer",
            Self::Answer => "signal_answer",
            Self::Candidate => "signal_candidate",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueWaitingPayload {
    pub queue_size: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFoundPayload {
    pub match_id: MatchId,
    pub peer: PeerProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRefPayload {
    pub match_id: MatchId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReadyPayload {
    pub match_id: MatchId,
    pub is_initiator: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEndedPayload {
    pub match_id: MatchId,
    pub reason: EndReason,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    pub match_id: MatchId,
    pub payload: serde_json::Value,
}

/// Everything the server can say to a matchmaking client.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    QueueWaiting(QueueWaitingPayload),
    MatchFound(MatchFoundPayload),
    PeerAccepted(MatchRefPayload),
    MatchReady(MatchReadyPayload),
    MatchRejected(MatchRefPayload),
    MatchEnded(MatchEndedPayload),
    Signal(SignalKind, SignalPayload),
}

impl ServerEvent {
    /// Wire name of the Socket.IO event this variant is emitted as.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::QueueWaiting(_) => "queue_waiting",
            Self::MatchFound(_) => "match_found",
            Self::PeerAccepted(_) => "peer_accepted",
            Self::MatchReady(_) => "match_ready",
            Self::MatchRejected(_) => "match_rejected",
            Self::MatchEnded(_) => "match_ended",
            Self::Signal(kind, _) => kind.event_name(),
        }
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// A message addressed to one connection.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: ConnectionId,
    pub event: ServerEvent,
}

/// Instruction for the session monitor's timer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Arm { match_id: MatchId },
    Cancel { match_id: MatchId },
}

/// What a handler decided: messages to deliver and timers to touch. The
/// core never performs I/O itself; the socket layer applies these after
/// the coordinator lock is released.
#[derive(Debug, Default)]
pub struct Effects {
    pub outbound: Vec<Outbound>,
    pub timers: Vec<TimerCommand>,
}

impl Effects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn send(&mut self, to: ConnectionId, event: ServerEvent) {
        self.outbound.push(Outbound { to, event });
    }

    pub fn arm_timer(&mut self, match_id: MatchId) {
        self.timers.push(TimerCommand::Arm { match_id });
    }

    pub fn cancel_timer(&mut self, match_id: MatchId) {
        self.timers.push(TimerCommand::Cancel { match_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn signal_kind_event_names() {
        assert_eq!(SignalKind::Offer.event_name(), "signal_offer");
        assert_eq!(SignalKind::Answer.event_name(), "signal_answer");
        assert_eq!(SignalKind::Candidate.event_name(), "signal_candidate");
    }

    #[test]
    fn server_event_names_match_protocol() {
        let match_id = Uuid::new_v4();
        let ev = ServerEvent::MatchReady(MatchReadyPayload {
            match_id,
            is_initiator: true,
        });
        assert_eq!(ev.event_name(), "match_ready");

        let ev = ServerEvent::Signal(
            SignalKind::Candidate,
            SignalPayload {
                match_id,
                payload: serde_json::json!({}),
            },
        );
        assert_eq!(ev.event_name(), "signal_candidate");
    }

    #[test]
    fn payloads_are_camel_case() {
        let json = serde_json::to_value(MatchReadyPayload {
            match_id: Uuid::new_v4(),
            is_initiator: false,
        })
        .unwrap();
        assert!(json.get("matchId").is_some());
        assert!(json.get("isInitiator").is_some());
    }
}
