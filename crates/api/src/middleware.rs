use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use offload_core::{CallerIdentity, SessionId};

use crate::app::errors::json_error;
use crate::context::SessionContext;

pub const SESSION_HEADER: &str = "x-session-id";
pub const USER_HEADER: &str = "x-user-id";

pub async fn session_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let identity = extract_identity(req.headers()).ok_or_else(|| {
        json_error(
            StatusCode::BAD_REQUEST,
            "missing_session",
            format!("{SESSION_HEADER} header is required"),
        )
    })?;

    req.extensions_mut().insert(SessionContext::new(identity));

    Ok(next.run(req).await)
}

fn extract_identity(headers: &HeaderMap) -> Option<CallerIdentity> {
    let session = header_str(headers, SESSION_HEADER)?;
    let identity = CallerIdentity::anonymous(SessionId::new(session).ok()?);

    Some(match header_str(headers, USER_HEADER) {
        Some(user) => identity.with_user(user),
        None => identity,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    (!value.is_empty()).then_some(value)
}
