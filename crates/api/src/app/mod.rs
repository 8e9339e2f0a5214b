//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (job store, worker pool, registry, coordinator)
//! - `work.rs`: the named work handlers
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use offload_infra::OffloadConfig;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;
pub mod work;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Must be called inside a Tokio runtime; the registry sweeper runs as a task.
pub fn build_app(config: &OffloadConfig) -> Router {
    let services = Arc::new(services::build_services(config));
    services::spawn_registry_sweeper(Arc::downgrade(&services), config.registry_ttl);

    // Session-scoped routes: require an `x-session-id` header.
    let scoped = routes::router().layer(axum::middleware::from_fn(middleware::session_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/stats", get(routes::system::stats))
        .merge(scoped)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
