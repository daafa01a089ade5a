//! Authorization and token endpoints.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use trace_core::error::AppError;

use crate::dtos::{AuthorizeQuery, TokenRequest, TokenResponse};
use crate::middleware::SessionUser;
use crate::startup::AppState;

/// `GET /oauth/authorize`. The logged-in user approves the request and
/// is sent back to the registered redirect target with a one-time code.
pub async fn authorize(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Query(query): Query<AuthorizeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let location = state
        .oauth
        .authorize(
            &query.response_type,
            &query.client_id,
            &query.redirect_uri,
            query.state.as_deref(),
            user.user_id,
        )
        .await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]))
}

/// `POST /oauth/token`. Client credentials ride in the body; no session.
pub async fn token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state
        .oauth
        .exchange(
            &request.grant_type,
            &request.client_id,
            &request.client_secret,
            request.code.as_deref(),
            request.redirect_uri.as_deref(),
            request.refresh_token.as_deref(),
        )
        .await?;
    Ok(Json(token.into()))
}
