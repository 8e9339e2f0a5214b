//! `JobRegistry` implementations.

mod in_memory;
mod session;

pub use in_memory::InMemoryJobRegistry;
pub use session::{InMemorySessionStore, SessionJobRegistry};
