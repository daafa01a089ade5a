use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::random_urlsafe_token;

/// Bearer credential pair. Refresh always rotates: the old row is deleted
/// and a fresh pair is minted, never extended in place.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OauthToken {
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub client_id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OauthToken {
    pub fn new(client_id: String, user_id: i64, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            access_token: random_urlsafe_token(32),
            refresh_token: random_urlsafe_token(32),
            client_id,
            user_id,
            expires_at: now + Duration::seconds(ttl_seconds),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Remaining access lifetime in whole seconds, clamped at zero.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}
