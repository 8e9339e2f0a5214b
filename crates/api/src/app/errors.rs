use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use offload_core::{OffloadError, PollResponse};

/// HTTP status for a poll-protocol response.
pub fn poll_status(response: &PollResponse) -> StatusCode {
    match response {
        PollResponse::Processing { .. } => StatusCode::ACCEPTED,
        PollResponse::Completed { .. } | PollResponse::Error { .. } => StatusCode::OK,
    }
}

/// Protocol errors keep the `error` status body; only the HTTP code varies.
pub fn offload_error_to_response(err: OffloadError) -> axum::response::Response {
    let status = match &err {
        OffloadError::MissingJobId | OffloadError::InvalidContext(_) => StatusCode::BAD_REQUEST,
        OffloadError::UnknownJob => StatusCode::NOT_FOUND,
        OffloadError::SubmissionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        // The job finished; its failure is the terminal payload.
        OffloadError::WorkFailure(_) => StatusCode::OK,
        OffloadError::Timeout => StatusCode::GATEWAY_TIMEOUT,
    };
    (status, axum::Json(PollResponse::from(err))).into_response()
}

/// Malformed poll parameters still answer with an `error` status body.
pub fn query_rejection_to_response(rejection: QueryRejection) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(PollResponse::error(rejection.body_text())),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
