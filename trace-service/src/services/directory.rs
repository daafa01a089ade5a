//! Read-only directory of users, roles, corpora and documents.
//!
//! Search and preview only ever read this data; writes belong to the
//! ingestion side of the platform and are out of scope here.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use trace_core::error::AppError;

use crate::models::{Corpus, Document, UserRecord};

#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, AppError>;
    async fn user_roles(&self, user_id: i64) -> Result<Vec<i64>, AppError>;
    async fn all_corpora(&self) -> Result<Vec<Corpus>, AppError>;
    async fn corpora_owned_by(&self, user_id: i64) -> Result<Vec<Corpus>, AppError>;
    async fn corpora_granted_to_roles(&self, role_ids: &[i64]) -> Result<Vec<Corpus>, AppError>;
    async fn find_document(&self, document_id: i64) -> Result<Option<Document>, AppError>;
}

#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, AppError> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, user_name FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_roles(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let roles: Vec<(i64,)> =
            sqlx::query_as("SELECT role_id FROM user_roles WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(roles.into_iter().map(|(id,)| id).collect())
    }

    async fn all_corpora(&self) -> Result<Vec<Corpus>, AppError> {
        let corpora = sqlx::query_as::<_, Corpus>("SELECT * FROM corpora ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(corpora)
    }

    async fn corpora_owned_by(&self, user_id: i64) -> Result<Vec<Corpus>, AppError> {
        let corpora =
            sqlx::query_as::<_, Corpus>("SELECT * FROM corpora WHERE owner_id = $1 ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(corpora)
    }

    async fn corpora_granted_to_roles(&self, role_ids: &[i64]) -> Result<Vec<Corpus>, AppError> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }
        let corpora = sqlx::query_as::<_, Corpus>(
            r#"
            SELECT DISTINCT c.* FROM corpora c
            JOIN role_corpus_access rca ON rca.corpus_id = c.id
            WHERE rca.role_id = ANY($1)
            ORDER BY c.id
            "#,
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(corpora)
    }

    async fn find_document(&self, document_id: i64) -> Result<Option<Document>, AppError> {
        let document = sqlx::query_as::<_, Document>(
            "SELECT id, corpus_id, file_name, object_name FROM documents WHERE id = $1",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(document)
    }
}

/// In-memory directory for tests. Populate the public fields directly.
#[derive(Default)]
pub struct MemoryDirectory {
    pub users: Vec<UserRecord>,
    pub roles: Vec<(i64, i64)>,
    pub corpora: Vec<Corpus>,
    pub grants: Vec<(i64, i64)>,
    pub documents: Vec<Document>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn user_roles(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        Ok(self
            .roles
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, rid)| *rid)
            .collect())
    }

    async fn all_corpora(&self) -> Result<Vec<Corpus>, AppError> {
        Ok(self.corpora.clone())
    }

    async fn corpora_owned_by(&self, user_id: i64) -> Result<Vec<Corpus>, AppError> {
        Ok(self
            .corpora
            .iter()
            .filter(|c| c.owner_id == user_id)
            .cloned()
            .collect())
    }

    async fn corpora_granted_to_roles(&self, role_ids: &[i64]) -> Result<Vec<Corpus>, AppError> {
        let granted: std::collections::HashSet<i64> = self
            .grants
            .iter()
            .filter(|(rid, _)| role_ids.contains(rid))
            .map(|(_, cid)| *cid)
            .collect();
        Ok(self
            .corpora
            .iter()
            .filter(|c| granted.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn find_document(&self, document_id: i64) -> Result<Option<Document>, AppError> {
        Ok(self.documents.iter().find(|d| d.id == document_id).cloned())
    }
}
