//! `offload-core`: protocol building blocks for deferred work.
//!
//! This crate contains **pure** types and capability traits (no threads, no IO).

pub mod context;
pub mod error;
pub mod executor;
pub mod id;
pub mod invocation;
pub mod key;
pub mod poll;
pub mod registry;
pub mod result;
pub mod session;

pub use context::{CallerContext, CallerIdentity};
pub use error::{OffloadError, OffloadResult};
pub use executor::JobExecutor;
pub use id::{JobId, SessionId};
pub use invocation::Invocation;
pub use key::SubmissionKey;
pub use poll::{PollQuery, PollResponse};
pub use registry::{JobRegistry, RegistryEntry, RegistryError};
pub use result::{JobHandle, JobOutput, JobResult};
pub use session::SessionStore;
