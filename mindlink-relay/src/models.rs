use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle for one live socket connection, allocated by the registry
/// on connect and invalid after disconnect.
pub type ConnectionId = Uuid;

/// Identifier of a paired buddy session.
pub type MatchId = Uuid;

// ---------------------------------------------------------------------------
// Mood
// ---------------------------------------------------------------------------

/// Self-declared mood tag shown to the matched peer. Advisory only — the
/// coordinator never filters on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Calm,
    Stressed,
    Sad,
    Anxious,
    Motivated,
    Social,
    #[default]
    #[serde(other)]
    Neutral,
}

// ---------------------------------------------------------------------------
// EndReason
// ---------------------------------------------------------------------------

/// Why a match ended. Unrecognized client-supplied reasons degrade to
/// `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Rejected,
    Timeout,
    PeerDisconnected,
    ConnectionFailed,
    ChannelClosed,
    #[serde(other)]
    Ended,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Timeout => "timeout",
            Self::PeerDisconnected => "peer_disconnected",
            Self::ConnectionFailed => "connection_failed",
            Self::ChannelClosed => "channel_closed",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PeerProfile / WaitingEntry
// ---------------------------------------------------------------------------

/// What one side of a match learns about the other: declared profile only,
/// never the peer's connection id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerProfile {
    pub display_name: String,
    pub mood: Mood,
    pub interests: Vec<String>,
}

/// A participant's declared intent to be matched, snapshotted at join time.
#[derive(Debug, Clone)]
pub struct WaitingEntry {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub mood: Mood,
    pub interests: Vec<String>,
    pub joined_at: DateTime<Utc>,
}

impl WaitingEntry {
    pub fn profile(&self) -> PeerProfile {
        PeerProfile {
            display_name: self.display_name.clone(),
            mood: self.mood,
            interests: self.interests.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// Consent / connection state of an active match. There is no `Ended`
/// variant: ended matches are removed from the active table immediately,
/// so absence is the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    PendingConsent,
    Ready,
    Connecting,
    Established,
}

/// A paired session between exactly two participants. The two entries are
/// snapshots taken at pairing time, decoupled from later profile changes.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: MatchId,
    pub a: WaitingEntry,
    pub b: WaitingEntry,
    /// Deterministically the smaller of the two connection ids, so both
    /// sides agree on who sends the offer without a coordination round-trip.
    pub initiator: ConnectionId,
    pub consent_a: bool,
    pub consent_b: bool,
    pub state: MatchState,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn new(a: WaitingEntry, b: WaitingEntry) -> Self {
        let initiator = a.connection_id.min(b.connection_id);
        Self {
            id: Uuid::new_v4(),
            a,
            b,
            initiator,
            consent_a: false,
            consent_b: false,
            state: MatchState::PendingConsent,
            created_at: Utc::now(),
        }
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.a.connection_id == connection_id || self.b.connection_id == connection_id
    }

    /// The other participant's connection id, if `connection_id` is one of
    /// the two sides.
    pub fn peer_of(&self, connection_id: ConnectionId) -> Option<ConnectionId> {
        if self.a.connection_id == connection_id {
            Some(self.b.connection_id)
        } else if self.b.connection_id == connection_id {
            Some(self.a.connection_id)
        } else {
            None
        }
    }

    /// Record consent for one side. Returns false when `connection_id` is
    /// not a participant.
    pub fn set_consent(&mut self, connection_id: ConnectionId) -> bool {
        if self.a.connection_id == connection_id {
            self.consent_a = true;
            true
        } else if self.b.connection_id == connection_id {
            self.consent_b = true;
            true
        } else {
            false
        }
    }

    pub fn both_accepted(&self) -> bool {
        self.consent_a && self.consent_b
    }
}
