use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::random_urlsafe_token;

/// Single-use proof that a user approved an application for a redirect
/// target. Rows are destroyed on first redemption or by the expiry sweep.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: i64,
    pub redirect_uri: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    pub fn new(client_id: String, user_id: i64, redirect_uri: String, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            code: random_urlsafe_token(32),
            client_id,
            user_id,
            redirect_uri,
            expires_at: now + Duration::seconds(ttl_seconds),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_code_is_not_expired() {
        let code = AuthorizationCode::new("client".into(), 1, "https://a.test/cb".into(), 300);
        assert!(!code.is_expired());
    }

    #[test]
    fn code_expires_after_ttl() {
        let mut code = AuthorizationCode::new("client".into(), 1, "https://a.test/cb".into(), 300);
        code.expires_at = Utc::now() - Duration::seconds(1);
        assert!(code.is_expired());
    }
}
