use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Application, OauthToken};

#[derive(Debug, Deserialize, Validate)]
pub struct ApplicationCreateRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(url, length(max = 512))]
    pub redirect_uri: String,
}

/// Application as returned to its owner. The secret is present exactly
/// once, in the creation response.
#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub id: String,
    pub name: String,
    pub redirect_uri: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl ApplicationResponse {
    pub fn with_secret(app: Application) -> Self {
        let secret = app.client_secret.clone();
        let mut response = Self::redacted(app);
        response.client_secret = Some(secret);
        response
    }

    pub fn redacted(app: Application) -> Self {
        Self {
            id: app.id,
            name: app.name,
            redirect_uri: app.redirect_uri,
            client_id: app.client_id,
            client_secret: None,
            enabled: app.enabled,
            created_at: app.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
}

impl From<OauthToken> for TokenResponse {
    fn from(token: OauthToken) -> Self {
        Self {
            expires_in: token.expires_in(),
            access_token: token.access_token,
            token_type: "Bearer".to_string(),
            refresh_token: token.refresh_token,
        }
    }
}
