use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Service-wide error taxonomy. Every user-visible failure maps to a
/// stable machine-readable code; internal detail stays in server logs.
#[derive(Debug, Error)]
pub enum AppError {
    // Authorization domain
    #[error("unknown or disabled client")]
    InvalidClient,

    #[error("redirect_uri does not match the registered value")]
    RedirectMismatch,

    #[error("invalid client credentials")]
    InvalidClientCredentials,

    #[error("application is disabled")]
    ApplicationDisabled,

    #[error("invalid or expired grant")]
    InvalidGrant,

    #[error("grant is bound to a different client")]
    ClientMismatch,

    #[error("unsupported grant_type: {0}")]
    UnsupportedGrant(String),

    // Authentication domain
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid token")]
    InvalidToken,

    // Preview domain
    #[error("preview token is invalid, expired or already consumed")]
    CapabilityExpiredOrConsumed,

    #[error("document id does not match the preview token")]
    DocumentIdMismatch,

    #[error("document not found")]
    DocumentNotFound,

    // Ambient
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Cache error: {0}")]
    CacheError(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Stable reason code exposed to callers.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidClient => "invalid_client",
            AppError::RedirectMismatch => "redirect_mismatch",
            AppError::InvalidClientCredentials => "invalid_client_credentials",
            AppError::ApplicationDisabled => "application_disabled",
            AppError::InvalidGrant => "invalid_grant",
            AppError::ClientMismatch => "client_mismatch",
            AppError::UnsupportedGrant(_) => "unsupported_grant_type",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::CapabilityExpiredOrConsumed => "preview_token_invalid",
            AppError::DocumentIdMismatch => "document_mismatch",
            AppError::DocumentNotFound => "document_not_found",
            AppError::ValidationError(_) => "validation_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::DatabaseError(_) => "internal_error",
            AppError::CacheError(_) => "internal_error",
            AppError::ConfigError(_) => "internal_error",
            AppError::InternalError(_) => "internal_error",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let code = self.code();
        let (status, details) = match &self {
            AppError::InvalidClient
            | AppError::RedirectMismatch
            | AppError::InvalidGrant
            | AppError::ClientMismatch
            | AppError::UnsupportedGrant(_) => (StatusCode::BAD_REQUEST, Some(self.to_string())),
            AppError::InvalidClientCredentials
            | AppError::ApplicationDisabled
            | AppError::Unauthorized
            | AppError::InvalidToken
            | AppError::CapabilityExpiredOrConsumed => {
                (StatusCode::UNAUTHORIZED, Some(self.to_string()))
            }
            AppError::DocumentIdMismatch => (StatusCode::FORBIDDEN, Some(self.to_string())),
            AppError::DocumentNotFound => (StatusCode::NOT_FOUND, Some(self.to_string())),
            AppError::ValidationError(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Some(err.to_string()))
            }
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, Some(err.to_string())),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, Some(err.to_string())),
            // 5xx: log the cause, never leak it to the caller
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::CacheError(err) => {
                tracing::error!(error = %err, "cache error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        (status, Json(ErrorResponse { error: code, details })).into_response()
    }
}
