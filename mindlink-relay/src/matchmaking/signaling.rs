use crate::models::{ConnectionId, Match, MatchState};

use super::events::{ServerEvent, SignalKind, SignalPayload};

/// Route one negotiation payload to the sender's peer. Pure pass-through:
/// the payload schema belongs to the client transport layer and is never
/// inspected beyond the routing fields. Returns `None` when the sender is
/// not a participant of the match — the caller drops the payload silently,
/// since a sender may be racing a just-ended match.
///
/// A first relayed payload moves a ready match into `Connecting`.
pub fn route(
    m: &mut Match,
    sender: ConnectionId,
    kind: SignalKind,
    payload: serde_json::Value,
) -> Option<(ConnectionId, ServerEvent)> {
    let peer = m.peer_of(sender)?;
    if m.state == MatchState::Ready {
        m.state = MatchState::Connecting;
    }
    Some((
        peer,
        ServerEvent::Signal(
            kind,
            SignalPayload {
                match_id: m.id,
                payload,
            },
        ),
    ))
}
