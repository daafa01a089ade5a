//! One-time document preview endpoint.

use axum::{
    extract::{Path, Query, State},
    response::Html,
};
use serde::Deserialize;
use trace_core::error::AppError;

use crate::services::preview::render_preview_html;
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub token: Option<String>,
}

/// `GET /open/document/preview/{document_id}?token=`. The capability is
/// consumed before anything else, so a rejected request still burns the
/// token.
pub async fn preview_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Html<String>, AppError> {
    let token = query.token.ok_or(AppError::CapabilityExpiredOrConsumed)?;
    let capability = state
        .preview
        .redeem(&token)
        .await?
        .ok_or(AppError::CapabilityExpiredOrConsumed)?;

    let document_id: i64 = document_id
        .parse()
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("document id must be numeric")))?;
    if document_id != capability.document_id {
        return Err(AppError::DocumentIdMismatch);
    }

    let document = state
        .directory
        .find_document(document_id)
        .await?
        .ok_or(AppError::DocumentNotFound)?;

    let content = match document.object_name.as_deref() {
        Some(object_name) => state.content.fetch_text(object_name).await?,
        None => None,
    };
    // Without stored text the excerpt itself is the page, so the viewer
    // still sees the highlighted passage.
    let content = match content {
        Some(text) if !text.is_empty() => text,
        _ => capability.highlight_text.clone(),
    };

    Ok(Html(render_preview_html(
        &document.file_name,
        &content,
        &capability.highlight_text,
    )))
}
