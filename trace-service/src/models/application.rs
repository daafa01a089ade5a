use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::random_urlsafe_token;

/// A registered third-party application. The client secret is stored as
/// issued and is only ever returned to the owner at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_id: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub fn new(name: String, redirect_uri: String, user_id: i64) -> Self {
        let (client_id, client_secret) = Self::generate_client_credentials();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            redirect_uri,
            client_id,
            client_secret,
            user_id,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// Generate a client_id / client_secret pair.
    pub fn generate_client_credentials() -> (String, String) {
        (random_urlsafe_token(32), random_urlsafe_token(48))
    }
}
