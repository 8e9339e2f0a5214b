use axum::{routing::any, Router};

pub mod offload;
pub mod system;

/// Router for all session-scoped endpoints.
pub fn router() -> Router {
    Router::new().route("/work/:handler", any(offload::offload))
}
