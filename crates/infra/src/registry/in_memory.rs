use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use offload_core::{JobId, JobRegistry, RegistryEntry, RegistryError, SubmissionKey};

fn poisoned() -> RegistryError {
    RegistryError::Unavailable("registry lock poisoned".to_string())
}

/// Process-local registry for tests/dev and single-node hosts.
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    inner: RwLock<HashMap<SubmissionKey, RegistryEntry>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn get(&self, key: &SubmissionKey) -> Result<Option<RegistryEntry>, RegistryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(key).copied())
    }

    fn set(&self, key: &SubmissionKey, job_id: JobId) -> Result<(), RegistryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert(key.clone(), RegistryEntry::new(job_id));
        Ok(())
    }

    fn clear_if_matches(&self, key: &SubmissionKey, job_id: JobId) -> Result<bool, RegistryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get(key) {
            Some(entry) if entry.job_id == job_id => {
                map.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn sweep_abandoned(&self, cutoff: DateTime<Utc>) -> Result<usize, RegistryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let before = map.len();
        map.retain(|_, entry| entry.registered_at >= cutoff);
        Ok(before - map.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_core::SessionId;

    fn key(route: &str, session: &str) -> SubmissionKey {
        SubmissionKey::new(route, SessionId::new(session).unwrap()).unwrap()
    }

    #[test]
    fn set_get_and_clear() {
        let registry = InMemoryJobRegistry::new();
        let k = key("/report", "42");
        let job = JobId::new();

        assert!(registry.get(&k).unwrap().is_none());
        registry.set(&k, job).unwrap();
        assert_eq!(registry.get(&k).unwrap().map(|e| e.job_id), Some(job));

        assert!(registry.clear_if_matches(&k, job).unwrap());
        assert!(registry.get(&k).unwrap().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn stale_clear_leaves_newer_entry() {
        let registry = InMemoryJobRegistry::new();
        let k = key("/report", "42");
        let (a, b) = (JobId::new(), JobId::new());

        registry.set(&k, a).unwrap();
        registry.set(&k, b).unwrap();

        assert!(!registry.clear_if_matches(&k, a).unwrap());
        assert_eq!(registry.get(&k).unwrap().map(|e| e.job_id), Some(b));
    }

    #[test]
    fn keys_are_independent() {
        let registry = InMemoryJobRegistry::new();
        let job = JobId::new();
        registry.set(&key("/report", "42"), job).unwrap();

        assert!(registry.get(&key("/report", "43")).unwrap().is_none());
        assert!(registry.get(&key("/export", "42")).unwrap().is_none());
        assert!(!registry.clear_if_matches(&key("/report", "43"), job).unwrap());
    }

    #[test]
    fn sweep_drops_only_old_entries() {
        let registry = InMemoryJobRegistry::new();
        registry.set(&key("/report", "1"), JobId::new()).unwrap();
        let cutoff = Utc::now() + chrono::Duration::milliseconds(1);
        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.set(&key("/report", "2"), JobId::new()).unwrap();

        assert_eq!(registry.sweep_abandoned(cutoff).unwrap(), 1);
        assert!(registry.get(&key("/report", "1")).unwrap().is_none());
        assert!(registry.get(&key("/report", "2")).unwrap().is_some());
    }
}
