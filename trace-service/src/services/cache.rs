//! Expiring key-value store over Redis.
//!
//! Holds the two short-lived artifacts that never touch Postgres: preview
//! capability tokens and session records. `take` is the load-bearing
//! operation: GETDEL makes one-time redemption atomic under races.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use trace_core::error::AppError;

#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Store a value that disappears after `ttl_seconds`.
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), AppError>;
    /// Read without consuming.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    /// Atomically read and delete. Of two concurrent callers at most one
    /// sees the value.
    async fn take(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

/// Redis-backed expiring store.
#[derive(Clone)]
pub struct RedisService {
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to Redis...");
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        tracing::info!("Successfully connected to Redis");
        Ok(Self { manager })
    }
}

#[async_trait]
impl ExpiringStore for RedisService {
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

/// In-memory expiring store for tests, with real expiry semantics.
#[derive(Default)]
pub struct MemoryExpiringStore {
    entries: std::sync::Mutex<std::collections::HashMap<String, MemoryEntry>>,
}

struct MemoryEntry {
    value: String,
    expires_at: std::time::Instant,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        std::time::Instant::now() >= self.expires_at
    }
}

impl MemoryExpiringStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, std::collections::HashMap<String, MemoryEntry>>, AppError>
    {
        self.entries
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("cache mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl ExpiringStore for MemoryExpiringStore {
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), AppError> {
        self.lock()?.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: std::time::Instant::now() + std::time::Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AppError> {
        let removed = self.lock()?.remove(key);
        Ok(removed.filter(|e| !e.is_expired()).map(|e| e.value))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
