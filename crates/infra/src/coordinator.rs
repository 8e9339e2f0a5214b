//! Submission coordination (application-level orchestration).
//!
//! The `SubmissionCoordinator` decides, for every invocation of an offloadable
//! route, whether to reuse the job already in flight for the caller, submit a
//! new one, or answer a status poll.
//!
//! ```text
//! Invocation
//!   ├─ Submit ─▶ lock key ─▶ registry.get ─▶ executor.poll(active)
//!   │              ├─ active job non-terminal ─▶ Processing(active)
//!   │              └─ none / finished / purged ─▶ executor.submit ─▶ registry.set ─▶ Processing(new)
//!   └─ Poll ───▶ executor.poll(id)
//!                  ├─ Pending   ─▶ Processing(id)
//!                  ├─ terminal  ─▶ registry.clear_if_matches ─▶ Completed / Error
//!                  └─ unknown   ─▶ Error("unknown job")
//! ```
//!
//! The coordinator composes the `JobRegistry` and `JobExecutor` capabilities
//! and performs no IO of its own.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use offload_core::{
    CallerContext, Invocation, JobExecutor, JobId, JobRegistry, JobResult, OffloadError,
    OffloadResult, PollResponse, RegistryError, SubmissionKey,
};

fn registry_failure(err: RegistryError) -> OffloadError {
    OffloadError::submission(err.to_string())
}

/// Per-key mutual exclusion.
///
/// Only invocations for the same key wait on each other; the shared set is
/// held just long enough to mark a key busy or free.
#[derive(Debug, Default)]
struct KeyLocks {
    busy: Mutex<HashSet<SubmissionKey>>,
    freed: Condvar,
}

impl KeyLocks {
    fn acquire(&self, key: &SubmissionKey) -> KeyGuard<'_> {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        while busy.contains(key) {
            busy = self
                .freed
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        busy.insert(key.clone());
        KeyGuard {
            locks: self,
            key: key.clone(),
        }
    }
}

struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: SubmissionKey,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut busy = self
            .locks
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        busy.remove(&self.key);
        self.locks.freed.notify_all();
    }
}

/// Orchestrates submission deduplication and status polling.
///
/// ## Guarantees
///
/// - **Deduplication**: for one `SubmissionKey`, at most one non-terminal job
///   exists at any instant; concurrent submissions for the key are serialized
/// - **Terminal observation**: a poll that sees a terminal result clears the
///   key's registry entry, but only if it still points at that job
/// - **Isolation**: a failure for one key never affects another key
///
/// ## Generic Parameters
///
/// - `R`: registry holding the active job per key
/// - `E`: execution backend
#[derive(Debug)]
pub struct SubmissionCoordinator<R, E> {
    registry: R,
    executor: E,
    locks: KeyLocks,
}

impl<R, E> SubmissionCoordinator<R, E> {
    pub fn new(registry: R, executor: E) -> Self {
        Self {
            registry,
            executor,
            locks: KeyLocks::default(),
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

impl<R, E> SubmissionCoordinator<R, E>
where
    R: JobRegistry,
    E: JobExecutor,
{
    /// Answer an invocation. Every failure is folded into an `error` status.
    pub fn handle(&self, invocation: Invocation) -> PollResponse {
        self.try_handle(invocation)
            .unwrap_or_else(PollResponse::from)
    }

    /// Like [`handle`](Self::handle), but keeps the error kind so hosts can
    /// choose transport-level status codes.
    pub fn try_handle(&self, invocation: Invocation) -> OffloadResult<PollResponse> {
        match invocation {
            Invocation::Submit { key, context } => self.submit(&key, context),
            Invocation::Poll { key, job_id } => self.poll(&key, job_id.as_deref()),
        }
    }

    /// Submission branch: reuse the active job for `key` or start a new one.
    pub fn submit(&self, key: &SubmissionKey, context: CallerContext) -> OffloadResult<PollResponse> {
        let _guard = self.locks.acquire(key);

        let active = match self.registry.get(key) {
            Ok(entry) => entry,
            // An unreadable entry cannot name a live job; the `set` below
            // overwrites it.
            Err(RegistryError::Corrupt(reason)) => {
                warn!(key = %key, reason = %reason, "ignoring corrupt registry entry");
                None
            }
            Err(e) => return Err(registry_failure(e)),
        };

        if let Some(entry) = active {
            match self.executor.poll(entry.job_id) {
                Some(JobResult::Pending) => {
                    debug!(key = %key, job_id = %entry.job_id, "reusing in-flight job");
                    return Ok(PollResponse::processing(entry.job_id));
                }
                state => {
                    // Finished without an observing poll, or purged by the executor.
                    debug!(
                        key = %key,
                        job_id = %entry.job_id,
                        purged = state.is_none(),
                        "replacing inactive registry entry"
                    );
                    self.registry
                        .clear_if_matches(key, entry.job_id)
                        .map_err(registry_failure)?;
                }
            }
        }

        let handle = self.executor.submit(context).inspect_err(|e| {
            warn!(key = %key, error = %e, "submission rejected");
        })?;

        self.registry
            .set(key, handle.id)
            .map_err(registry_failure)?;

        debug!(key = %key, job_id = %handle.id, "submitted job");
        Ok(PollResponse::processing(handle.id))
    }

    /// Poll branch: report the state of `job_id`.
    pub fn poll(&self, key: &SubmissionKey, job_id: Option<&str>) -> OffloadResult<PollResponse> {
        let job_id: JobId = job_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(OffloadError::MissingJobId)?
            .parse()?;

        let Some(result) = self.executor.poll(job_id) else {
            self.clear_observed(key, job_id);
            return Err(OffloadError::UnknownJob);
        };

        match result {
            JobResult::Pending => Ok(PollResponse::processing(job_id)),
            JobResult::Succeeded { output } => {
                self.clear_observed(key, job_id);
                Ok(output.into())
            }
            JobResult::Failed { error } => {
                self.clear_observed(key, job_id);
                Err(OffloadError::WorkFailure(error))
            }
        }
    }

    /// Drop registry entries older than `max_age`. Out-of-band maintenance.
    pub fn sweep_abandoned(&self, max_age: std::time::Duration) -> OffloadResult<usize> {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let swept = self
            .registry
            .sweep_abandoned(cutoff)
            .map_err(registry_failure)?;
        if swept > 0 {
            debug!(swept, "swept abandoned registry entries");
        }
        Ok(swept)
    }

    fn clear_observed(&self, key: &SubmissionKey, job_id: JobId) {
        match self.registry.clear_if_matches(key, job_id) {
            Ok(true) => debug!(key = %key, job_id = %job_id, "cleared registry entry"),
            Ok(false) => {}
            // The terminal result is still delivered; the next submission
            // replaces the stale entry.
            Err(e) => warn!(key = %key, job_id = %job_id, error = %e, "failed to clear registry entry"),
        }
    }
}
