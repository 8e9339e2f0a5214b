//! Infrastructure layer: job execution, registries, coordination, config.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod jobs;
pub mod registry;

pub use client::{poll_until_terminal, PollPolicy};
pub use config::{ConfigError, OffloadConfig};
pub use coordinator::SubmissionCoordinator;
