//! Client-side polling loop.

use std::thread;
use std::time::{Duration, Instant};

use offload_core::{OffloadError, PollResponse};
use tracing::debug;

/// How a client re-polls a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between consecutive polls.
    pub interval: Duration,
    /// Overall give-up bound, measured from the first poll.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Invoke `poll` until it yields a terminal response or the policy times out.
///
/// Giving up does not cancel the job; the returned `error` status is local.
pub fn poll_until_terminal<F>(policy: &PollPolicy, mut poll: F) -> PollResponse
where
    F: FnMut() -> PollResponse,
{
    let deadline = Instant::now() + policy.timeout;
    let mut attempts = 0u32;

    loop {
        let response = poll();
        attempts += 1;
        if response.is_terminal() {
            debug!(attempts, status = response.status(), "poll reached terminal state");
            return response;
        }

        let now = Instant::now();
        if now >= deadline {
            debug!(attempts, "poll timed out");
            return OffloadError::Timeout.into();
        }
        thread::sleep(policy.interval.min(deadline - now));
    }
}
