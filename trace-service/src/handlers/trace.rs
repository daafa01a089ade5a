//! The open text-trace endpoint.

use axum::{extract::State, Json};
use trace_core::error::AppError;
use validator::Validate;

use crate::dtos::{TextTraceRequest, TraceResponse};
use crate::middleware::AuthUser;
use crate::startup::AppState;

/// `POST /open/text-trace`. Runs the fusion search for the bearer
/// principal and mints a one-time preview token per match that maps to a
/// real stored document.
pub async fn text_trace(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Json(request): Json<TextTraceRequest>,
) -> Result<Json<TraceResponse>, AppError> {
    request.validate()?;

    let mut matches = state
        .search
        .trace(
            &principal,
            &request.text,
            request.match_mode,
            request.top_k,
            request.threshold,
        )
        .await?;

    // Backends may surface synthetic ids; only positive numeric ids name
    // a stored document a preview can be issued for.
    for result in &mut matches {
        let Ok(document_id) = result.document_id.parse::<i64>() else {
            continue;
        };
        if document_id <= 0 {
            continue;
        }
        let token = state
            .preview
            .issue(document_id, principal.user_id, &result.excerpt)
            .await?;
        result.preview_url = Some(state.preview.preview_url(document_id, &token));
    }

    tracing::debug!(
        user_id = principal.user_id,
        total = matches.len(),
        "text trace completed"
    );
    Ok(Json(TraceResponse {
        total: matches.len(),
        matches,
    }))
}
