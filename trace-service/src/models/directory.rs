use serde::{Deserialize, Serialize};

/// User record as held by the directory.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub user_name: String,
}

/// A searchable corpus. `index_name` / `collection_name` being NULL means
/// the corpus has no lexical / vector index configured and is skipped by
/// the corresponding search path.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Corpus {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub index_name: Option<String>,
    pub collection_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: i64,
    pub corpus_id: i64,
    pub file_name: String,
    pub object_name: Option<String>,
}
