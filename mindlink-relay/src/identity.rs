use crate::models::ConnectionId;

/// Identity seam: the surrounding platform may know who a connection
/// belongs to; this core only ever asks for a display name, and only to
/// default a `join_queue` that omitted one.
pub trait IdentityProvider: Send + Sync {
    fn display_name(&self, connection_id: ConnectionId) -> Option<String>;
}

/// Default provider for the anonymous deployment: knows nobody, so callers
/// fall back to "Anonymous".
pub struct AnonymousIdentity;

impl IdentityProvider for AnonymousIdentity {
    fn display_name(&self, _connection_id: ConnectionId) -> Option<String> {
        None
    }
}
