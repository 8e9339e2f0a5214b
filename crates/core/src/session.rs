//! Per-session key-value capability supplied by the host.

use std::sync::Arc;

use crate::id::SessionId;
use crate::registry::RegistryError;

/// Durable string map scoped to one caller session.
pub trait SessionStore: Send + Sync {
    fn get(&self, session: &SessionId, field: &str) -> Result<Option<String>, RegistryError>;

    fn set(&self, session: &SessionId, field: &str, value: String) -> Result<(), RegistryError>;

    /// Atomically remove `field` if its current value equals `expected`.
    fn remove_if_eq(
        &self,
        session: &SessionId,
        field: &str,
        expected: &str,
    ) -> Result<bool, RegistryError>;

    /// Keep only the fields for which `keep(session, field, value)` holds.
    /// Returns the number of removed fields.
    fn retain(
        &self,
        keep: &mut dyn FnMut(&SessionId, &str, &str) -> bool,
    ) -> Result<usize, RegistryError>;
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn get(&self, session: &SessionId, field: &str) -> Result<Option<String>, RegistryError> {
        (**self).get(session, field)
    }

    fn set(&self, session: &SessionId, field: &str, value: String) -> Result<(), RegistryError> {
        (**self).set(session, field, value)
    }

    fn remove_if_eq(
        &self,
        session: &SessionId,
        field: &str,
        expected: &str,
    ) -> Result<bool, RegistryError> {
        (**self).remove_if_eq(session, field, expected)
    }

    fn retain(
        &self,
        keep: &mut dyn FnMut(&SessionId, &str, &str) -> bool,
    ) -> Result<usize, RegistryError> {
        (**self).retain(keep)
    }
}
