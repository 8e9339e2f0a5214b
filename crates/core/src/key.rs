//! Submission keys: the deduplication identity of a caller.

use serde::{Deserialize, Serialize};

use crate::error::OffloadError;
use crate::id::SessionId;

/// Identity under which at most one job may be in flight.
///
/// Built explicitly by the host from a stable route name and the caller's
/// session, never inferred from transport-level path strings, so the submit
/// and poll branches always agree on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionKey {
    route: String,
    session: SessionId,
}

impl SubmissionKey {
    pub fn new(route: impl Into<String>, session: SessionId) -> Result<Self, OffloadError> {
        let route = route.into();
        if route.trim().is_empty() {
            return Err(OffloadError::invalid_context("route must not be empty"));
        }
        Ok(Self { route, session })
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Name of the per-session field holding this route's active job.
    pub fn session_field(&self) -> String {
        format!("active_job_id:{}", self.route)
    }
}

impl core::fmt::Display for SubmissionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.route, self.session)
    }
}
