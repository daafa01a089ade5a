use serde::{Deserialize, Serialize};

/// Authenticated caller resolved from a bearer token. Threaded explicitly
/// through search and preview issuance rather than read from ambient
/// request state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i64,
    pub user_name: String,
    pub roles: Vec<i64>,
    pub client_id: String,
}

impl Principal {
    pub fn has_role(&self, role_id: i64) -> bool {
        self.roles.contains(&role_id)
    }
}
