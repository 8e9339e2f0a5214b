//! Executor capability consumed by the coordinator.

use std::sync::Arc;

use crate::context::CallerContext;
use crate::error::OffloadResult;
use crate::id::JobId;
use crate::result::{JobHandle, JobResult};

/// Background execution backend.
///
/// `submit` must return without waiting for the work. Once `poll` reports a
/// terminal result for an id, every later `poll` for that id returns the same
/// value until the backend's own retention policy drops the record, after
/// which `poll` returns `None`.
pub trait JobExecutor: Send + Sync {
    /// Accept a unit of work; fails with `OffloadError::SubmissionFailure`.
    fn submit(&self, context: CallerContext) -> OffloadResult<JobHandle>;

    /// Current state of a job, or `None` if the id is unknown.
    fn poll(&self, job_id: JobId) -> Option<JobResult>;
}

impl<T: JobExecutor + ?Sized> JobExecutor for Arc<T> {
    fn submit(&self, context: CallerContext) -> OffloadResult<JobHandle> {
        (**self).submit(context)
    }

    fn poll(&self, job_id: JobId) -> Option<JobResult> {
        (**self).poll(job_id)
    }
}
