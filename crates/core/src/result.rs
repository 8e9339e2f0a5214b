//! Job handles and outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::id::JobId;

/// Handle returned by the executor when work is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: JobId,
    pub created_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
        }
    }
}

/// What a successful unit of work produced. Opaque to the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum JobOutput {
    /// Rendered content, returned to the caller as-is.
    Content(String),
    /// Structured data, returned to the caller as serialized JSON.
    Data(JsonValue),
    /// A location the caller should navigate to.
    Redirect(String),
}

impl JobOutput {
    pub fn content(s: impl Into<String>) -> Self {
        Self::Content(s.into())
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect(location.into())
    }
}

/// Outcome of a job as seen by a poll.
///
/// Once `Succeeded` or `Failed`, the value never changes for that job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobResult {
    Pending,
    Succeeded { output: JobOutput },
    Failed { error: String },
}

impl JobResult {
    pub fn succeeded(output: JobOutput) -> Self {
        Self::Succeeded { output }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobResult::Pending)
    }
}
