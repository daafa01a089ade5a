//! Application management for session-authenticated owners.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use trace_core::error::AppError;
use validator::Validate;

use crate::dtos::{ApplicationCreateRequest, ApplicationResponse};
use crate::middleware::SessionUser;
use crate::startup::AppState;

/// Register an application. The response carries the client secret; it
/// is never returned again.
pub async fn create_application(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Json(request): Json<ApplicationCreateRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let app = state
        .oauth
        .create_application(user.user_id, request.name, request.redirect_uri)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse::with_secret(app)),
    ))
}

pub async fn list_applications(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
) -> Result<Json<Vec<ApplicationResponse>>, AppError> {
    let apps = state.oauth.list_applications(user.user_id).await?;
    Ok(Json(
        apps.into_iter().map(ApplicationResponse::redacted).collect(),
    ))
}

pub async fn delete_application(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Path(app_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.oauth.delete_application(&app_id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
