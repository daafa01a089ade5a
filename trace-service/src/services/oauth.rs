//! OAuth authorization-code flow over the credential store.
//!
//! Policy lives here; the store only moves rows. Secrets are compared in
//! constant time and authorization codes are single use with a short
//! lifetime. Refresh always rotates the whole pair.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use trace_core::error::AppError;

use crate::models::{Application, AuthorizationCode, OauthToken};
use crate::services::store::{CredentialStore, RotationOutcome};

pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

#[derive(Clone)]
pub struct OauthEngine {
    store: Arc<dyn CredentialStore>,
    code_ttl_seconds: i64,
    access_token_ttl_seconds: i64,
}

impl OauthEngine {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        code_ttl_seconds: i64,
        access_token_ttl_seconds: i64,
    ) -> Self {
        Self {
            store,
            code_ttl_seconds,
            access_token_ttl_seconds,
        }
    }

    /// Register a new application for `owner_id` and return it with the
    /// freshly minted credentials. The secret is not retrievable later.
    pub async fn create_application(
        &self,
        owner_id: i64,
        name: String,
        redirect_uri: String,
    ) -> Result<Application, AppError> {
        let app = Application::new(name, redirect_uri, owner_id);
        self.store.insert_application(&app).await?;
        tracing::info!(client_id = %app.client_id, owner_id, "application registered");
        Ok(app)
    }

    pub async fn list_applications(&self, owner_id: i64) -> Result<Vec<Application>, AppError> {
        self.store.list_applications_by_owner(owner_id).await
    }

    pub async fn delete_application(&self, app_id: &str, owner_id: i64) -> Result<(), AppError> {
        if !self.store.delete_application(app_id, owner_id).await? {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "application {} not found",
                app_id
            )));
        }
        tracing::info!(app_id, owner_id, "application deleted");
        Ok(())
    }

    /// Approve an authorization request on behalf of `user_id` and return
    /// the redirect location carrying the single-use code. `state` is
    /// echoed back untouched when the client supplied one.
    pub async fn authorize(
        &self,
        response_type: &str,
        client_id: &str,
        redirect_uri: &str,
        state: Option<&str>,
        user_id: i64,
    ) -> Result<String, AppError> {
        if response_type != "code" {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "unsupported response_type: {}",
                response_type
            )));
        }

        // A disabled application is indistinguishable from an unknown one
        // here; only the token endpoint names the difference.
        let app = self
            .store
            .find_application_by_client_id(client_id)
            .await?
            .filter(|a| a.enabled)
            .ok_or(AppError::InvalidClient)?;

        if app.redirect_uri != redirect_uri {
            return Err(AppError::RedirectMismatch);
        }

        let code = AuthorizationCode::new(
            client_id.to_string(),
            user_id,
            redirect_uri.to_string(),
            self.code_ttl_seconds,
        );
        self.store.insert_authorization_code(&code).await?;
        tracing::info!(client_id, user_id, "authorization code issued");

        let separator = if redirect_uri.contains('?') { '&' } else { '?' };
        let mut location = format!(
            "{}{}code={}",
            redirect_uri,
            separator,
            urlencoding::encode(&code.code)
        );
        if let Some(state) = state {
            location.push_str("&state=");
            location.push_str(&urlencoding::encode(state));
        }
        Ok(location)
    }

    /// Token endpoint. Authenticates the client, then dispatches on grant
    /// type.
    #[allow(clippy::too_many_arguments)]
    pub async fn exchange(
        &self,
        grant_type: &str,
        client_id: &str,
        client_secret: &str,
        code: Option<&str>,
        redirect_uri: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<OauthToken, AppError> {
        let app = self.authenticate_client(client_id, client_secret).await?;

        match grant_type {
            GRANT_AUTHORIZATION_CODE => {
                let code = code.ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("code is required"))
                })?;
                let redirect_uri = redirect_uri.ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("redirect_uri is required"))
                })?;
                self.redeem_code_grant(&app, code, redirect_uri).await
            }
            GRANT_REFRESH_TOKEN => {
                let refresh_token = refresh_token.ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("refresh_token is required"))
                })?;
                self.refresh_grant(&app, refresh_token).await
            }
            other => Err(AppError::UnsupportedGrant(other.to_string())),
        }
    }

    /// Resolve a bearer access token to its live row.
    pub async fn resolve_access_token(
        &self,
        access_token: &str,
    ) -> Result<OauthToken, AppError> {
        let token = self
            .store
            .find_token_by_access(access_token)
            .await?
            .ok_or(AppError::InvalidToken)?;
        if token.is_expired() {
            return Err(AppError::InvalidToken);
        }
        Ok(token)
    }

    /// Revoke every token a user holds for one application.
    pub async fn revoke_user_tokens(
        &self,
        user_id: i64,
        client_id: &str,
    ) -> Result<u64, AppError> {
        let removed = self
            .store
            .delete_tokens_for_user_and_client(user_id, client_id)
            .await?;
        if removed > 0 {
            tracing::info!(user_id, client_id, removed, "tokens revoked");
        }
        Ok(removed)
    }

    pub async fn sweep_expired_codes(&self) -> Result<u64, AppError> {
        self.store.sweep_expired_codes().await
    }

    async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Application, AppError> {
        let app = self
            .store
            .find_application_by_client_id(client_id)
            .await?
            .ok_or(AppError::InvalidClientCredentials)?;

        let matches: bool = app
            .client_secret
            .as_bytes()
            .ct_eq(client_secret.as_bytes())
            .into();
        if !matches {
            return Err(AppError::InvalidClientCredentials);
        }
        if !app.enabled {
            return Err(AppError::ApplicationDisabled);
        }
        Ok(app)
    }

    async fn redeem_code_grant(
        &self,
        app: &Application,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OauthToken, AppError> {
        // The code is consumed before the remaining checks run, so a
        // mismatched retry cannot replay it.
        let redeemed = self
            .store
            .redeem_authorization_code(code)
            .await?
            .ok_or(AppError::InvalidGrant)?;

        if redeemed.client_id != app.client_id {
            return Err(AppError::ClientMismatch);
        }
        if redeemed.redirect_uri != redirect_uri {
            return Err(AppError::RedirectMismatch);
        }

        let token = OauthToken::new(
            app.client_id.clone(),
            redeemed.user_id,
            self.access_token_ttl_seconds,
        );
        self.store.insert_token(&token).await?;
        tracing::info!(
            client_id = %app.client_id,
            user_id = redeemed.user_id,
            "token pair issued"
        );
        Ok(token)
    }

    async fn refresh_grant(
        &self,
        app: &Application,
        refresh_token: &str,
    ) -> Result<OauthToken, AppError> {
        match self
            .store
            .rotate_token(refresh_token, &app.client_id, self.access_token_ttl_seconds)
            .await?
        {
            RotationOutcome::Rotated { new, .. } => {
                tracing::info!(
                    client_id = %app.client_id,
                    user_id = new.user_id,
                    "token pair rotated"
                );
                Ok(new)
            }
            RotationOutcome::ClientMismatch => Err(AppError::ClientMismatch),
            RotationOutcome::NotFound => Err(AppError::InvalidGrant),
        }
    }
}
