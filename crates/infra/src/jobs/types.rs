//! Core job types and policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use offload_core::{CallerContext, JobHandle, JobId, JobOutput, JobResult};

/// Job execution status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, waiting to be picked up
    Pending,
    /// Currently being executed
    Running,
    /// Failed, will be retried once `scheduled_at` passes
    Retrying { error: String, attempt: u32 },
    /// Completed successfully
    Succeeded { output: JobOutput },
    /// Exhausted attempts; `error` is the last failure verbatim
    Failed { error: String, attempts: u32 },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded { .. } | JobStatus::Failed { .. })
    }

    pub fn is_claimable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Retrying { .. })
    }

    /// What a poll reports for this status.
    pub fn to_result(&self) -> JobResult {
        match self {
            JobStatus::Pending | JobStatus::Running | JobStatus::Retrying { .. } => {
                JobResult::Pending
            }
            JobStatus::Succeeded { output } => JobResult::succeeded(output.clone()),
            JobStatus::Failed { error, .. } => JobResult::failed(error.clone()),
        }
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^(attempt-1)
    #[default]
    Exponential,
    /// Linear backoff: base * attempt
    Linear,
}

/// Retry policy for failed work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    /// Run once; the first failure is terminal.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Calculate delay after a given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt - 1);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
        };

        delay.min(self.max_delay.max(self.base_delay))
    }

    /// Check if another attempt is allowed after `attempt` runs.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// A unit of offloaded work as persisted by a job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Snapshot the handler runs against; `context.handler` selects the handler.
    pub context: CallerContext,
    pub status: JobStatus,
    pub retry_policy: RetryPolicy,
    /// Number of runs started so far
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Earliest time a retry may run
    pub scheduled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(context: CallerContext) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            context,
            status: JobStatus::Pending,
            retry_policy: RetryPolicy::default(),
            attempt: 0,
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            finished_at: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn handler(&self) -> &str {
        &self.context.handler
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            created_at: self.created_at,
        }
    }

    /// Check if the job may be claimed now.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status.is_claimable() && self.scheduled_at.is_none_or(|at| now >= at)
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.attempt += 1;
        self.scheduled_at = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_succeeded(&mut self, output: JobOutput) {
        let now = Utc::now();
        self.status = JobStatus::Succeeded { output };
        self.updated_at = now;
        self.finished_at = Some(now);
    }

    /// Record a failed run: schedule a retry or become terminal.
    pub fn mark_failed(&mut self, error: String) {
        let now = Utc::now();
        self.updated_at = now;

        if self.retry_policy.should_retry(self.attempt) {
            let delay = self.retry_policy.delay_for_attempt(self.attempt);
            self.scheduled_at =
                Some(now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero()));
            self.status = JobStatus::Retrying {
                error,
                attempt: self.attempt,
            };
        } else {
            self.finished_at = Some(now);
            self.status = JobStatus::Failed {
                error,
                attempts: self.attempt,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_core::{CallerIdentity, SessionId};

    fn context() -> CallerContext {
        CallerContext::new(
            "report",
            "GET",
            "/work/report",
            CallerIdentity::anonymous(SessionId::new("42").unwrap()),
        )
    }

    #[test]
    fn exponential_backoff_calculates_correctly() {
        let policy = RetryPolicy::exponential(
            5,
            Duration::from_millis(100),
            Duration::from_secs(10),
        );

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy::exponential(
            40,
            Duration::from_millis(100),
            Duration::from_secs(1),
        );

        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(1));
    }

    #[test]
    fn linear_backoff_increases_linearly() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            strategy: BackoffStrategy::Linear,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(10));

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[test]
    fn job_lifecycle() {
        let mut job = Job::new(context());

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.status.to_result(), JobResult::Pending);
        assert!(job.is_ready(Utc::now()));

        job.mark_running();
        assert_eq!(job.attempt, 1);
        assert!(!job.is_ready(Utc::now()));
        assert_eq!(job.status.to_result(), JobResult::Pending);

        job.mark_succeeded(JobOutput::content("done"));
        assert!(job.status.is_terminal());
        assert!(job.finished_at.is_some());
        assert_eq!(
            job.status.to_result(),
            JobResult::succeeded(JobOutput::content("done"))
        );
    }

    #[test]
    fn job_failure_and_retry() {
        let mut job = Job::new(context())
            .with_retry_policy(RetryPolicy::fixed(2, Duration::from_millis(50)));

        job.mark_running();
        job.mark_failed("error 1".to_string());
        assert!(matches!(job.status, JobStatus::Retrying { attempt: 1, .. }));
        assert!(job.scheduled_at.is_some());
        assert_eq!(job.status.to_result(), JobResult::Pending);

        job.mark_running();
        job.mark_failed("error 2".to_string());
        assert_eq!(
            job.status,
            JobStatus::Failed {
                error: "error 2".to_string(),
                attempts: 2
            }
        );
        assert_eq!(job.status.to_result(), JobResult::failed("error 2"));
    }

    #[test]
    fn first_failure_is_terminal_by_default() {
        let mut job = Job::new(context());
        job.mark_running();
        job.mark_failed("divide by zero".to_string());
        assert_eq!(job.status.to_result(), JobResult::failed("divide by zero"));
    }
}
