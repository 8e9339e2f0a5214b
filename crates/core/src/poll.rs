//! Poll protocol: the wire contract between a caller and the coordinator.
//!
//! Stateless. Retry cadence belongs to the caller.

use serde::{Deserialize, Serialize};

use crate::error::OffloadError;
use crate::id::JobId;
use crate::result::{JobOutput, JobResult};

/// Status payload returned for every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollResponse {
    Processing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
    },
    Completed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        redirect: Option<String>,
    },
    Error {
        error: String,
    },
}

impl PollResponse {
    pub fn processing(job_id: JobId) -> Self {
        Self::Processing {
            job_id: Some(job_id),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollResponse::Processing { .. })
    }

    /// Wire name of the status.
    pub fn status(&self) -> &'static str {
        match self {
            PollResponse::Processing { .. } => "processing",
            PollResponse::Completed { .. } => "completed",
            PollResponse::Error { .. } => "error",
        }
    }
}

impl From<JobOutput> for PollResponse {
    fn from(output: JobOutput) -> Self {
        match output {
            JobOutput::Content(payload) => PollResponse::Completed {
                payload: Some(payload),
                redirect: None,
            },
            JobOutput::Data(value) => PollResponse::Completed {
                payload: Some(value.to_string()),
                redirect: None,
            },
            JobOutput::Redirect(location) => PollResponse::Completed {
                payload: None,
                redirect: Some(location),
            },
        }
    }
}

impl From<JobResult> for PollResponse {
    fn from(result: JobResult) -> Self {
        match result {
            JobResult::Pending => PollResponse::Processing { job_id: None },
            JobResult::Succeeded { output } => output.into(),
            JobResult::Failed { error } => PollResponse::Error { error },
        }
    }
}

impl From<OffloadError> for PollResponse {
    fn from(err: OffloadError) -> Self {
        PollResponse::error(err.to_string())
    }
}

/// Query parameters a caller sends with a status poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub check_status: bool,
    #[serde(default)]
    pub job_id: Option<String>,
}
