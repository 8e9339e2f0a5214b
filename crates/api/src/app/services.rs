//! Infrastructure wiring: job store, worker pool, session registry, coordinator.

use std::sync::{Arc, Weak};

use serde::Serialize;

use offload_infra::jobs::{
    ExecutorStats, InMemoryJobStore, JobStats, JobStore, QueuedExecutor, WorkerPoolConfig,
    WorkerPoolHandle,
};
use offload_infra::registry::{InMemorySessionStore, SessionJobRegistry};
use offload_infra::{OffloadConfig, SubmissionCoordinator};

use crate::app::work;

pub type Executor = QueuedExecutor<Arc<InMemoryJobStore>>;
pub type Registry = SessionJobRegistry<Arc<InMemorySessionStore>>;
pub type Coordinator = SubmissionCoordinator<Registry, Arc<Executor>>;

/// Everything the routes need, shared behind an `Arc`.
///
/// Dropping the last reference stops the worker pool.
#[derive(Debug)]
pub struct AppServices {
    pub coordinator: Coordinator,
    pub config: OffloadConfig,
    pool: WorkerPoolHandle,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub executor: ExecutorStats,
    pub jobs: Option<JobStats>,
}

impl AppServices {
    pub fn stats(&self) -> ServiceStats {
        let jobs = self
            .coordinator
            .executor()
            .store()
            .stats()
            .map_err(|e| tracing::warn!(error = %e, "failed to read job stats"))
            .ok();
        ServiceStats {
            executor: self.pool.stats(),
            jobs,
        }
    }
}

pub fn build_services(config: &OffloadConfig) -> AppServices {
    let mut executor = QueuedExecutor::new(InMemoryJobStore::arc());
    work::register(&mut executor);
    let executor = Arc::new(executor);

    let pool = executor.spawn_workers(
        WorkerPoolConfig::default()
            .with_name("offload-worker")
            .with_workers(config.workers)
            .with_idle_interval(config.worker_idle)
            .with_retention(Some(config.retention)),
    );

    let registry = SessionJobRegistry::new(Arc::new(InMemorySessionStore::new()));

    tracing::info!(workers = config.workers, "offload services ready");
    AppServices {
        coordinator: SubmissionCoordinator::new(registry, executor),
        config: config.clone(),
        pool,
    }
}

/// Periodically drop registry entries nobody polled to completion.
///
/// Stops once the services are gone.
pub fn spawn_registry_sweeper(services: Weak<AppServices>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(std::time::Duration::from_secs(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(services) = services.upgrade() else {
                break;
            };
            let ttl = services.config.registry_ttl;
            let result =
                tokio::task::spawn_blocking(move || services.coordinator.sweep_abandoned(ttl)).await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "registry sweep failed"),
                Err(e) => tracing::warn!(error = %e, "registry sweep task failed"),
            }
        }
    });
}
