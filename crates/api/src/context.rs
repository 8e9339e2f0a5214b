use offload_core::{CallerIdentity, SessionId};

/// Caller identity for a request.
///
/// Inserted by the session middleware; present for every offloadable route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    identity: CallerIdentity,
}

impl SessionContext {
    pub fn new(identity: CallerIdentity) -> Self {
        Self { identity }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.identity.session
    }

    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }
}
