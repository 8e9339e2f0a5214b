//! Registry of outstanding jobs per submission key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::JobId;
use crate::key::SubmissionKey;

/// Failure of the backend holding registry state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("registry backend unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt registry entry: {0}")]
    Corrupt(String),
}

/// The job currently outstanding for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub job_id: JobId,
    pub registered_at: DateTime<Utc>,
}

impl RegistryEntry {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            registered_at: Utc::now(),
        }
    }
}

/// Maps submission keys to the job outstanding for them.
///
/// Callers serialize `get` + `set` for one key themselves; the registry only
/// guarantees that `clear_if_matches` is an atomic compare-and-delete.
pub trait JobRegistry: Send + Sync {
    fn get(&self, key: &SubmissionKey) -> Result<Option<RegistryEntry>, RegistryError>;

    fn set(&self, key: &SubmissionKey, job_id: JobId) -> Result<(), RegistryError>;

    /// Remove the entry for `key` only if it still points at `job_id`.
    ///
    /// Returns whether an entry was removed. A late poll for an old job must
    /// not clobber a newer submission for the same key.
    fn clear_if_matches(&self, key: &SubmissionKey, job_id: JobId) -> Result<bool, RegistryError>;

    /// Drop entries registered before `cutoff`. Maintenance only.
    fn sweep_abandoned(&self, cutoff: DateTime<Utc>) -> Result<usize, RegistryError>;
}

impl<T: JobRegistry + ?Sized> JobRegistry for Arc<T> {
    fn get(&self, key: &SubmissionKey) -> Result<Option<RegistryEntry>, RegistryError> {
        (**self).get(key)
    }

    fn set(&self, key: &SubmissionKey, job_id: JobId) -> Result<(), RegistryError> {
        (**self).set(key, job_id)
    }

    fn clear_if_matches(&self, key: &SubmissionKey, job_id: JobId) -> Result<bool, RegistryError> {
        (**self).clear_if_matches(key, job_id)
    }

    fn sweep_abandoned(&self, cutoff: DateTime<Utc>) -> Result<usize, RegistryError> {
        (**self).sweep_abandoned(cutoff)
    }
}
