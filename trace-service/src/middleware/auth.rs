//! Bearer authentication for the open API surface.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use trace_core::error::AppError;

use crate::models::Principal;
use crate::startup::AppState;

/// Resolve `Authorization: Bearer <token>` to a [`Principal`] and stash
/// it in request extensions. Absent and expired tokens fail identically
/// so a probe learns nothing about token history.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let token = state.oauth.resolve_access_token(token).await?;
    let user = state
        .directory
        .find_user(token.user_id)
        .await?
        .ok_or(AppError::InvalidToken)?;
    let roles = state.directory.user_roles(user.user_id).await?;

    req.extensions_mut().insert(Principal {
        user_id: user.user_id,
        user_name: user.user_name,
        roles,
        client_id: token.client_id,
    });

    Ok(next.run(req).await)
}

/// Extractor handing the resolved principal to handlers.
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}
