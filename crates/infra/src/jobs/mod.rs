//! Background job system backing the `JobExecutor` capability.
//!
//! ## Design
//!
//! - Jobs carry the caller snapshot and are routed to handlers by name
//! - Handlers are registered at startup in a static lookup table
//! - Optional retry policy with backoff for failed work
//! - Terminal jobs are immutable and purged after a retention period
//!
//! ## Components
//!
//! - `Job`: persisted unit of work with status and retry bookkeeping
//! - `JobStore`: persistence for jobs (in-memory here)
//! - `QueuedExecutor`: submit/poll adapter plus the worker pool that runs jobs

pub mod executor;
pub mod store;
pub mod types;

pub use executor::{
    ExecutorStats, QueuedExecutor, WorkHandler, WorkerPoolConfig, WorkerPoolHandle,
};
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{BackoffStrategy, Job, JobStatus, RetryPolicy};
