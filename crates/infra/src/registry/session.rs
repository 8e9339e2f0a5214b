use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use offload_core::{
    JobId, JobRegistry, RegistryEntry, RegistryError, SessionId, SessionStore, SubmissionKey,
};

/// In-memory per-session key-value store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: RwLock<HashMap<SessionId, HashMap<String, String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All fields of one session (empty if unknown).
    pub fn fields(&self, session: &SessionId) -> HashMap<String, String> {
        self.inner
            .read()
            .ok()
            .and_then(|m| m.get(session).cloned())
            .unwrap_or_default()
    }
}

fn poisoned() -> RegistryError {
    RegistryError::Unavailable("session store lock poisoned".to_string())
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session: &SessionId, field: &str) -> Result<Option<String>, RegistryError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(session).and_then(|fields| fields.get(field)).cloned())
    }

    fn set(&self, session: &SessionId, field: &str, value: String) -> Result<(), RegistryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.entry(session.clone())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    fn remove_if_eq(
        &self,
        session: &SessionId,
        field: &str,
        expected: &str,
    ) -> Result<bool, RegistryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let Some(fields) = map.get_mut(session) else {
            return Ok(false);
        };
        if fields.get(field).map(String::as_str) != Some(expected) {
            return Ok(false);
        }
        fields.remove(field);
        if fields.is_empty() {
            map.remove(session);
        }
        Ok(true)
    }

    fn retain(
        &self,
        keep: &mut dyn FnMut(&SessionId, &str, &str) -> bool,
    ) -> Result<usize, RegistryError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let mut removed = 0;
        for (session, fields) in map.iter_mut() {
            let before = fields.len();
            fields.retain(|field, value| keep(session, field, value));
            removed += before - fields.len();
        }
        map.retain(|_, fields| !fields.is_empty());
        Ok(removed)
    }
}

const FIELD_PREFIX: &str = "active_job_id:";

/// Registry that keeps each route's active job in the caller's session.
///
/// The only persisted state is one `active_job_id:<route>` field per session,
/// holding the JSON-encoded `RegistryEntry`.
#[derive(Debug, Default)]
pub struct SessionJobRegistry<S> {
    sessions: S,
}

impl<S: SessionStore> SessionJobRegistry<S> {
    pub fn new(sessions: S) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    fn read(&self, key: &SubmissionKey) -> Result<Option<(String, RegistryEntry)>, RegistryError> {
        let Some(raw) = self.sessions.get(key.session(), &key.session_field())? else {
            return Ok(None);
        };
        let entry = decode(&raw)?;
        Ok(Some((raw, entry)))
    }
}

fn decode(raw: &str) -> Result<RegistryEntry, RegistryError> {
    serde_json::from_str(raw).map_err(|e| RegistryError::Corrupt(e.to_string()))
}

impl<S: SessionStore> JobRegistry for SessionJobRegistry<S> {
    fn get(&self, key: &SubmissionKey) -> Result<Option<RegistryEntry>, RegistryError> {
        Ok(self.read(key)?.map(|(_, entry)| entry))
    }

    fn set(&self, key: &SubmissionKey, job_id: JobId) -> Result<(), RegistryError> {
        let raw = serde_json::to_string(&RegistryEntry::new(job_id))
            .map_err(|e| RegistryError::Corrupt(e.to_string()))?;
        self.sessions.set(key.session(), &key.session_field(), raw)
    }

    fn clear_if_matches(&self, key: &SubmissionKey, job_id: JobId) -> Result<bool, RegistryError> {
        match self.read(key)? {
            // Compare-and-delete on the exact value read: a concurrent `set`
            // makes the removal a no-op.
            Some((raw, entry)) if entry.job_id == job_id => {
                self.sessions
                    .remove_if_eq(key.session(), &key.session_field(), &raw)
            }
            _ => Ok(false),
        }
    }

    fn sweep_abandoned(&self, cutoff: DateTime<Utc>) -> Result<usize, RegistryError> {
        self.sessions.retain(&mut |_: &SessionId, field: &str, value: &str| {
            if !field.starts_with(FIELD_PREFIX) {
                return true;
            }
            // Unreadable entries can never be cleared by a poll; drop them too.
            decode(value).is_ok_and(|entry| entry.registered_at >= cutoff)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn session(s: &str) -> SessionId {
        SessionId::new(s).unwrap()
    }

    fn key(route: &str, s: &str) -> SubmissionKey {
        SubmissionKey::new(route, session(s)).unwrap()
    }

    #[test]
    fn active_job_lives_in_the_session() {
        let store = Arc::new(InMemorySessionStore::new());
        let registry = SessionJobRegistry::new(store.clone());
        let job = JobId::new();

        registry.set(&key("/report", "42"), job).unwrap();

        let fields = store.fields(&session("42"));
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("active_job_id:/report"));
        assert_eq!(
            registry.get(&key("/report", "42")).unwrap().map(|e| e.job_id),
            Some(job)
        );
    }

    #[test]
    fn clear_if_matches_respects_newer_entry() {
        let registry = SessionJobRegistry::new(InMemorySessionStore::new());
        let k = key("/report", "42");
        let (a, b) = (JobId::new(), JobId::new());

        registry.set(&k, a).unwrap();
        registry.set(&k, b).unwrap();
        assert!(!registry.clear_if_matches(&k, a).unwrap());
        assert!(registry.clear_if_matches(&k, b).unwrap());
        assert!(registry.get(&k).unwrap().is_none());
    }

    #[test]
    fn unrelated_session_fields_survive() {
        let store = Arc::new(InMemorySessionStore::new());
        store.set(&session("42"), "theme", "dark".to_string()).unwrap();
        let registry = SessionJobRegistry::new(store.clone());
        let k = key("/report", "42");

        registry.set(&k, JobId::new()).unwrap();
        let swept = registry
            .sweep_abandoned(Utc::now() + chrono::Duration::seconds(1))
            .unwrap();

        assert_eq!(swept, 1);
        assert!(registry.get(&k).unwrap().is_none());
        assert_eq!(store.get(&session("42"), "theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn corrupt_entry_is_reported() {
        let store = Arc::new(InMemorySessionStore::new());
        store
            .set(&session("42"), "active_job_id:/report", "not json".to_string())
            .unwrap();
        let registry = SessionJobRegistry::new(store);

        assert!(matches!(
            registry.get(&key("/report", "42")),
            Err(RegistryError::Corrupt(_))
        ));
    }
}
