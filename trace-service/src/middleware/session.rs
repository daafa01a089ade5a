//! Session resolution for the management surface.
//!
//! Sessions are minted by the host platform; this service only resolves
//! `session:<id>` entries in the expiring store back to a user. The id
//! arrives either as an `X-Session-Id` header or a `session_id` cookie.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use trace_core::error::AppError;

use crate::models::UserRecord;
use crate::startup::AppState;

const SESSION_HEADER: &str = "x-session-id";
const SESSION_COOKIE: &str = "session_id";
const SESSION_KEY_PREFIX: &str = "session:";

pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session_id = session_id_from_headers(req.headers()).ok_or(AppError::Unauthorized)?;

    let user_id = state
        .cache
        .get(&format!("{}{}", SESSION_KEY_PREFIX, session_id))
        .await?
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(AppError::Unauthorized)?;

    let user = state
        .directory
        .find_user(user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Extractor handing the session user to management handlers.
pub struct SessionUser(pub UserRecord);

#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserRecord>()
            .cloned()
            .map(SessionUser)
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("from-header"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("session_id=from-cookie"),
        );
        assert_eq!(
            session_id_from_headers(&headers).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn cookie_is_parsed_out_of_a_multi_pair_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc123; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn absent_session_resolves_to_none() {
        let headers = HeaderMap::new();
        assert!(session_id_from_headers(&headers).is_none());
    }
}
