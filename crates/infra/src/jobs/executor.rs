//! Worker-pool executor: named handlers, queued jobs, retries, retention.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use offload_core::{
    CallerContext, JobExecutor, JobHandle, JobId, JobOutput, JobResult, OffloadError,
    OffloadResult,
};

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobStatus, RetryPolicy};

/// Work handler function type.
pub type WorkHandler = Box<dyn Fn(&CallerContext) -> Result<JobOutput, String> + Send + Sync>;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads
    pub workers: usize,
    /// How long an idle worker sleeps before polling the store again
    pub idle_interval: Duration,
    /// Terminal jobs older than this are purged; `None` keeps them forever
    pub retention: Option<Duration>,
    /// How often worker 0 runs the retention purge, busy or idle
    pub purge_interval: Duration,
    /// Name for logging and thread names
    pub name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            idle_interval: Duration::from_millis(100),
            retention: Some(Duration::from_secs(3600)),
            purge_interval: Duration::from_secs(1),
            name: "offload-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval;
        self
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_retried: u64,
    pub jobs_purged: u64,
    pub current_running: usize,
}

/// Handle to control a running worker pool.
#[derive(Debug)]
pub struct WorkerPoolHandle {
    shutdown: Arc<AtomicBool>,
    workers: Vec<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl WorkerPoolHandle {
    /// Request graceful shutdown and wait for in-flight work to finish.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }

    /// Get current executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Shared view of the statistics, for hosts that outlive the handle.
    pub fn stats_source(&self) -> Arc<Mutex<ExecutorStats>> {
        self.stats.clone()
    }
}

/// Dropping the handle signals the workers to stop without waiting for them.
impl Drop for WorkerPoolHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Queue-backed executor.
///
/// `submit` only persists the job; worker threads started with
/// [`QueuedExecutor::spawn_workers`] claim and run it. Handlers are looked up
/// by the `handler` name captured in the caller snapshot, from a table built
/// before the executor is shared.
pub struct QueuedExecutor<S: JobStore> {
    store: S,
    handlers: HashMap<String, WorkHandler>,
    retry_policy: RetryPolicy,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl<S: JobStore + std::fmt::Debug> std::fmt::Debug for QueuedExecutor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("QueuedExecutor")
            .field("store", &self.store)
            .field("handlers", &handlers)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

impl<S: JobStore> QueuedExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            retry_policy: RetryPolicy::default(),
            stats: Arc::new(Mutex::new(ExecutorStats::default())),
        }
    }

    /// Retry policy applied to every newly submitted job.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Register a handler under a stable name.
    pub fn register_handler<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&CallerContext) -> Result<JobOutput, String> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(handler = %name, "registered work handler");
        self.handlers.insert(name, Box::new(handler));
    }

    /// Register a handler whose parameters are decoded from the caller's form.
    ///
    /// Undecodable parameters fail the job rather than the submission.
    pub fn register_form_handler<P, F>(&mut self, name: impl Into<String>, handler: F)
    where
        P: DeserializeOwned + 'static,
        F: Fn(P, &CallerContext) -> Result<JobOutput, String> + Send + Sync + 'static,
    {
        self.register_handler(name, move |ctx: &CallerContext| {
            let params: P = serde_json::from_value(serde_json::Value::Object(ctx.form.clone()))
                .map_err(|e| format!("invalid parameters: {e}"))?;
            handler(params, ctx)
        });
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a claimed job and persist the outcome.
    ///
    /// Returns the error message if the run failed (terminal or not).
    pub fn execute_one(&self, job: &mut Job) -> Result<(), String> {
        let outcome = match self.handlers.get(job.handler()) {
            Some(handler) => run_guarded(handler, &job.context),
            None => Err(format!("no handler registered for work: {}", job.handler())),
        };

        match outcome {
            Ok(output) => {
                job.mark_succeeded(output);
                self.persist(job)?;
                debug!(job_id = %job.id, handler = %job.handler(), "job succeeded");
                self.record(|s| s.jobs_succeeded += 1);
                Ok(())
            }
            Err(error) => {
                job.mark_failed(error.clone());
                self.persist(job)?;
                match &job.status {
                    JobStatus::Retrying { attempt, .. } => {
                        debug!(job_id = %job.id, attempt, error = %error, "job failed, retry scheduled");
                        self.record(|s| s.jobs_retried += 1);
                    }
                    _ => {
                        warn!(job_id = %job.id, handler = %job.handler(), error = %error, "job failed");
                        self.record(|s| s.jobs_failed += 1);
                    }
                }
                Err(error)
            }
        }
    }

    /// Claim and run every ready job on the calling thread.
    ///
    /// Returns the number of jobs run. Useful when no worker pool is running.
    pub fn run_pending(&self) -> Result<usize, JobStoreError> {
        let mut ran = 0;
        while let Some(mut job) = self.store.claim_next()? {
            let _ = self.execute_one(&mut job);
            self.record(|s| s.jobs_processed += 1);
            ran += 1;
        }
        Ok(ran)
    }

    /// Drop terminal jobs older than `retention`.
    pub fn purge_expired(&self, retention: Duration) -> Result<usize, JobStoreError> {
        let Some(cutoff) = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let purged = self.store.purge_finished_before(cutoff)?;
        if purged > 0 {
            debug!(purged, "purged finished jobs");
            self.record(|s| s.jobs_purged += purged as u64);
        }
        Ok(purged)
    }

    fn persist(&self, job: &Job) -> Result<(), String> {
        match self.store.update(job) {
            Ok(()) => Ok(()),
            Err(JobStoreError::AlreadyTerminal(id)) => {
                // A duplicate run lost the race; the first terminal result stands.
                warn!(job_id = %id, "discarding outcome of duplicate run");
                Err(format!("job {id} already finished"))
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "failed to persist job outcome");
                Err(e.to_string())
            }
        }
    }

    fn record(&self, f: impl FnOnce(&mut ExecutorStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl<S: JobStore + 'static> QueuedExecutor<S> {
    /// Spawn the worker pool.
    pub fn spawn_workers(self: &Arc<Self>, config: WorkerPoolConfig) -> WorkerPoolHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let workers = (0..config.workers.max(1))
            .filter_map(|index| {
                let executor = Arc::clone(self);
                let config = config.clone();
                let shutdown = shutdown.clone();
                thread::Builder::new()
                    .name(format!("{}-{index}", config.name))
                    .spawn(move || worker_loop(executor, config, index, shutdown))
                    .map_err(|e| error!(worker = index, error = %e, "failed to spawn worker thread"))
                    .ok()
            })
            .collect();

        WorkerPoolHandle {
            shutdown,
            workers,
            stats: self.stats.clone(),
        }
    }
}

impl<S: JobStore> JobExecutor for QueuedExecutor<S> {
    fn submit(&self, context: CallerContext) -> OffloadResult<JobHandle> {
        if !self.has_handler(&context.handler) {
            return Err(OffloadError::submission(format!(
                "no handler registered for work: {}",
                context.handler
            )));
        }

        let job = Job::new(context).with_retry_policy(self.retry_policy.clone());
        let handle = job.handle();
        self.store
            .enqueue(job)
            .map_err(|e| OffloadError::submission(e.to_string()))?;

        debug!(job_id = %handle.id, "job enqueued");
        Ok(handle)
    }

    fn poll(&self, job_id: JobId) -> Option<JobResult> {
        match self.store.get(job_id) {
            Ok(job) => job.map(|j| j.status.to_result()),
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to read job");
                None
            }
        }
    }
}

fn run_guarded(handler: &WorkHandler, context: &CallerContext) -> Result<JobOutput, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(context))) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("work panicked: {msg}"))
        }
    }
}

fn worker_loop<S: JobStore>(
    executor: Arc<QueuedExecutor<S>>,
    config: WorkerPoolConfig,
    index: usize,
    shutdown: Arc<AtomicBool>,
) {
    info!(pool = %config.name, worker = index, "worker started");
    let mut last_purge = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        // Worker 0 owns retention so purges never run concurrently.
        if index == 0 {
            if let Some(retention) = config.retention {
                if last_purge.elapsed() >= config.purge_interval {
                    if let Err(e) = executor.purge_expired(retention) {
                        error!(pool = %config.name, error = %e, "failed to purge jobs");
                    }
                    last_purge = Instant::now();
                }
            }
        }

        match executor.store.claim_next() {
            Ok(Some(mut job)) => {
                debug!(pool = %config.name, worker = index, job_id = %job.id, "claimed job");
                executor.record(|s| s.current_running += 1);

                let _ = executor.execute_one(&mut job);

                executor.record(|s| {
                    s.current_running = s.current_running.saturating_sub(1);
                    s.jobs_processed += 1;
                });
            }
            Ok(None) => thread::sleep(config.idle_interval),
            Err(e) => {
                error!(pool = %config.name, worker = index, error = %e, "failed to claim job");
                thread::sleep(config.idle_interval);
            }
        }
    }

    info!(pool = %config.name, worker = index, "worker stopped");
}
