//! Credential store: applications, authorization codes and token pairs.
//!
//! Pure data access. The one nuance is atomicity: code redemption and
//! token rotation must be at-most-once under concurrent callers, so both
//! run as a single transaction (row lock, then delete/replace).

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use trace_core::error::AppError;

use crate::models::{Application, AuthorizationCode, OauthToken};

/// Result of an atomic refresh-token rotation.
#[derive(Debug)]
pub enum RotationOutcome {
    /// Old pair deleted, successor minted for the same user.
    Rotated { old: OauthToken, new: OauthToken },
    /// Refresh value exists but belongs to another client; row untouched.
    ClientMismatch,
    /// No token carries this refresh value.
    NotFound,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_application(&self, app: &Application) -> Result<(), AppError>;
    async fn find_application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Application>, AppError>;
    async fn list_applications_by_owner(&self, user_id: i64)
        -> Result<Vec<Application>, AppError>;
    /// Owner-scoped delete; false when the id is absent or owned by
    /// someone else.
    async fn delete_application(&self, app_id: &str, user_id: i64) -> Result<bool, AppError>;

    async fn insert_authorization_code(&self, code: &AuthorizationCode) -> Result<(), AppError>;
    /// Atomically consume a code. Returns None for absent and for expired
    /// codes alike; an expired row is deleted on the way out.
    async fn redeem_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, AppError>;
    /// Delete expired codes, returning the count removed.
    async fn sweep_expired_codes(&self) -> Result<u64, AppError>;

    async fn insert_token(&self, token: &OauthToken) -> Result<(), AppError>;
    async fn find_token_by_access(
        &self,
        access_token: &str,
    ) -> Result<Option<OauthToken>, AppError>;
    /// Atomically rotate a refresh token: delete the old pair and mint a
    /// successor for the same user with the given access lifetime.
    async fn rotate_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        ttl_seconds: i64,
    ) -> Result<RotationOutcome, AppError>;
    /// Bulk cleanup of every token a user holds for one application.
    async fn delete_tokens_for_user_and_client(
        &self,
        user_id: i64,
        client_id: &str,
    ) -> Result<u64, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// PostgreSQL-backed credential store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_application(&self, app: &Application) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_applications
                (id, name, redirect_uri, client_id, client_secret, user_id, enabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&app.id)
        .bind(&app.name)
        .bind(&app.redirect_uri)
        .bind(&app.client_id)
        .bind(&app.client_secret)
        .bind(app.user_id)
        .bind(app.enabled)
        .bind(app.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Application>, AppError> {
        let app = sqlx::query_as::<_, Application>(
            "SELECT * FROM oauth_applications WHERE client_id = $1",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(app)
    }

    async fn list_applications_by_owner(
        &self,
        user_id: i64,
    ) -> Result<Vec<Application>, AppError> {
        let apps = sqlx::query_as::<_, Application>(
            "SELECT * FROM oauth_applications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(apps)
    }

    async fn delete_application(&self, app_id: &str, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM oauth_applications WHERE id = $1 AND user_id = $2")
            .bind(app_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_authorization_code(&self, code: &AuthorizationCode) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_authorization_codes
                (code, client_id, user_id, redirect_uri, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id)
        .bind(&code.redirect_uri)
        .bind(code.expires_at)
        .bind(code.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn redeem_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, AppError> {
        let mut tx = self.pool.begin().await?;

        let found = sqlx::query_as::<_, AuthorizationCode>(
            "SELECT * FROM oauth_authorization_codes WHERE code = $1 FOR UPDATE",
        )
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(found) = found else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM oauth_authorization_codes WHERE code = $1")
            .bind(code)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        // An expired code is consumed like a live one but never honored.
        if found.is_expired() {
            return Ok(None);
        }
        Ok(Some(found))
    }

    async fn sweep_expired_codes(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM oauth_authorization_codes WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_token(&self, token: &OauthToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens
                (id, access_token, refresh_token, client_id, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&token.id)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(&token.client_id)
        .bind(token.user_id)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_token_by_access(
        &self,
        access_token: &str,
    ) -> Result<Option<OauthToken>, AppError> {
        let token =
            sqlx::query_as::<_, OauthToken>("SELECT * FROM oauth_tokens WHERE access_token = $1")
                .bind(access_token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(token)
    }

    async fn rotate_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        ttl_seconds: i64,
    ) -> Result<RotationOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let old = sqlx::query_as::<_, OauthToken>(
            "SELECT * FROM oauth_tokens WHERE refresh_token = $1 FOR UPDATE",
        )
        .bind(refresh_token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(old) = old else {
            return Ok(RotationOutcome::NotFound);
        };
        if old.client_id != client_id {
            return Ok(RotationOutcome::ClientMismatch);
        }

        sqlx::query("DELETE FROM oauth_tokens WHERE id = $1")
            .bind(&old.id)
            .execute(&mut *tx)
            .await?;

        let new = OauthToken::new(client_id.to_string(), old.user_id, ttl_seconds);
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens
                (id, access_token, refresh_token, client_id, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&new.id)
        .bind(&new.access_token)
        .bind(&new.refresh_token)
        .bind(&new.client_id)
        .bind(new.user_id)
        .bind(new.expires_at)
        .bind(new.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(RotationOutcome::Rotated { old, new })
    }

    async fn delete_tokens_for_user_and_client(
        &self,
        user_id: i64,
        client_id: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM oauth_tokens WHERE user_id = $1 AND client_id = $2")
            .bind(user_id)
            .bind(client_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-memory credential store for tests. A single lock around all three
/// maps makes redemption and rotation trivially atomic.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: std::sync::Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    applications: Vec<Application>,
    codes: std::collections::HashMap<String, AuthorizationCode>,
    tokens: std::collections::HashMap<String, OauthToken>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, AppError> {
        self.inner
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert_application(&self, app: &Application) -> Result<(), AppError> {
        self.lock()?.applications.push(app.clone());
        Ok(())
    }

    async fn find_application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Application>, AppError> {
        Ok(self
            .lock()?
            .applications
            .iter()
            .find(|a| a.client_id == client_id)
            .cloned())
    }

    async fn list_applications_by_owner(
        &self,
        user_id: i64,
    ) -> Result<Vec<Application>, AppError> {
        let mut apps: Vec<Application> = self
            .lock()?
            .applications
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apps)
    }

    async fn delete_application(&self, app_id: &str, user_id: i64) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        let before = inner.applications.len();
        inner
            .applications
            .retain(|a| !(a.id == app_id && a.user_id == user_id));
        Ok(inner.applications.len() < before)
    }

    async fn insert_authorization_code(&self, code: &AuthorizationCode) -> Result<(), AppError> {
        self.lock()?.codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn redeem_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, AppError> {
        let removed = self.lock()?.codes.remove(code);
        Ok(removed.filter(|c| !c.is_expired()))
    }

    async fn sweep_expired_codes(&self) -> Result<u64, AppError> {
        let mut inner = self.lock()?;
        let before = inner.codes.len();
        inner.codes.retain(|_, c| !c.is_expired());
        Ok((before - inner.codes.len()) as u64)
    }

    async fn insert_token(&self, token: &OauthToken) -> Result<(), AppError> {
        self.lock()?.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn find_token_by_access(
        &self,
        access_token: &str,
    ) -> Result<Option<OauthToken>, AppError> {
        Ok(self
            .lock()?
            .tokens
            .values()
            .find(|t| t.access_token == access_token)
            .cloned())
    }

    async fn rotate_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        ttl_seconds: i64,
    ) -> Result<RotationOutcome, AppError> {
        let mut inner = self.lock()?;
        let old = match inner
            .tokens
            .values()
            .find(|t| t.refresh_token == refresh_token)
            .cloned()
        {
            Some(old) => old,
            None => return Ok(RotationOutcome::NotFound),
        };
        if old.client_id != client_id {
            return Ok(RotationOutcome::ClientMismatch);
        }
        inner.tokens.remove(&old.id);
        let new = OauthToken::new(client_id.to_string(), old.user_id, ttl_seconds);
        inner.tokens.insert(new.id.clone(), new.clone());
        Ok(RotationOutcome::Rotated { old, new })
    }

    async fn delete_tokens_for_user_and_client(
        &self,
        user_id: i64,
        client_id: &str,
    ) -> Result<u64, AppError> {
        let mut inner = self.lock()?;
        let before = inner.tokens.len();
        inner
            .tokens
            .retain(|_, t| !(t.user_id == user_id && t.client_id == client_id));
        Ok((before - inner.tokens.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
