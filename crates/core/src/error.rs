//! Offload error model.

use thiserror::Error;

/// Result type used across the offload protocol.
pub type OffloadResult<T> = Result<T, OffloadError>;

/// Protocol-level error.
///
/// Every variant is surfaced to the caller as an `error` poll status; none of
/// them is fatal to the coordinator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OffloadError {
    /// A status poll arrived without a job id.
    #[error("missing job id")]
    MissingJobId,

    /// The executor does not know the job (expired, malformed or never existed).
    #[error("unknown job")]
    UnknownJob,

    /// The executor rejected or could not accept new work.
    #[error("{0}")]
    SubmissionFailure(String),

    /// The background work itself failed; the message is carried verbatim.
    #[error("{0}")]
    WorkFailure(String),

    /// The client gave up polling before a terminal state was observed.
    #[error("timeout")]
    Timeout,

    /// The caller snapshot could not be built or serialized.
    #[error("invalid caller context: {0}")]
    InvalidContext(String),
}

impl OffloadError {
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::SubmissionFailure(msg.into())
    }

    pub fn work(msg: impl Into<String>) -> Self {
        Self::WorkFailure(msg.into())
    }

    pub fn invalid_context(msg: impl Into<String>) -> Self {
        Self::InvalidContext(msg.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            OffloadError::MissingJobId => "missing_job_id",
            OffloadError::UnknownJob => "unknown_job",
            OffloadError::SubmissionFailure(_) => "submission_failure",
            OffloadError::WorkFailure(_) => "work_failure",
            OffloadError::Timeout => "timeout",
            OffloadError::InvalidContext(_) => "invalid_context",
        }
    }
}
