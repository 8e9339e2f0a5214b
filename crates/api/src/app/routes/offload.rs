//! Offloadable work routes.
//!
//! `ANY /work/:handler` submits the named work for the caller's session, or,
//! with `?check_status=true&job_id=…`, reports on a previously submitted job.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, FromRequest, Path, Query, Request},
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde_json::{Map, Value as JsonValue};

use offload_core::{CallerContext, Invocation, PollQuery, SubmissionKey};

use crate::app::{errors, services::AppServices};
use crate::context::SessionContext;

/// ANY /work/:handler
pub async fn offload(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(handler): Path<String>,
    poll: Result<Query<PollQuery>, QueryRejection>,
    Query(query): Query<BTreeMap<String, String>>,
    method: Method,
    req: Request,
) -> axum::response::Response {
    let Query(poll) = match poll {
        Ok(poll) => poll,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };

    // Keyed on the matched route, never on the raw request path.
    let route = format!("/work/{handler}");
    let key = match SubmissionKey::new(route, session.session_id().clone()) {
        Ok(key) => key,
        Err(e) => return errors::offload_error_to_response(e),
    };

    let form = if poll.check_status {
        Map::new()
    } else {
        match read_form(req).await {
            Ok(form) => form,
            Err(response) => return response,
        }
    };

    let invocation = Invocation::from_query(key, poll, || {
        let path = format!("/work/{handler}");
        let mut context = CallerContext::new(&handler, method.as_str(), path, session.identity().clone())
            .with_form(form)
            .with_route_param("handler", &handler);
        context.query = query;
        context
    });

    let outcome =
        tokio::task::spawn_blocking(move || services.coordinator.try_handle(invocation)).await;

    match outcome {
        Ok(Ok(response)) => (errors::poll_status(&response), Json(response)).into_response(),
        Ok(Err(e)) => errors::offload_error_to_response(e),
        Err(e) => {
            tracing::error!(handler = %handler, error = %e, "coordinator task failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

/// Body parameters for the caller snapshot: a JSON object or an urlencoded form.
async fn read_form(req: Request) -> Result<Map<String, JsonValue>, axum::response::Response> {
    let mime = content_type(req.headers());
    match mime.as_deref() {
        Some("application/json") => {
            let Json(body) = Json::<JsonValue>::from_request(req, &())
                .await
                .map_err(IntoResponse::into_response)?;
            match body {
                JsonValue::Object(map) => Ok(map),
                JsonValue::Null => Ok(Map::new()),
                _ => Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_body",
                    "JSON body must be an object",
                )),
            }
        }
        Some("application/x-www-form-urlencoded") => {
            let Form(fields) = Form::<BTreeMap<String, String>>::from_request(req, &())
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(fields
                .into_iter()
                .map(|(k, v)| (k, JsonValue::String(v)))
                .collect())
        }
        _ => Ok(Map::new()),
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = value.split(';').next()?.trim().to_ascii_lowercase();
    Some(mime)
}
