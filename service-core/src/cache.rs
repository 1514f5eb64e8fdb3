//! Best-effort cache interface.
//!
//! Every call is best-effort: a cache failure is logged and swallowed,
//! never surfaced to the caller. The store stays the source of truth.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;
    async fn del(&self, key: &str) -> Result<(), CacheError>;
    /// Remove every key starting with `prefix`.
    async fn invalidate_pattern(&self, prefix: &str) -> Result<(), CacheError>;
}

/// Store a value under a key, logging instead of failing.
pub async fn set_best_effort(cache: &dyn Cache, key: &str, value: &str, ttl_seconds: u64) {
    if let Err(e) = cache.set(key, value, ttl_seconds).await {
        warn!(key, error = %e, "Cache write failed, next read goes to the store");
    }
}

/// Delete a single key, logging instead of failing.
pub async fn del_best_effort(cache: &dyn Cache, key: &str) {
    if let Err(e) = cache.del(key).await {
        warn!(key, error = %e, "Cache delete failed, serving stale data");
    }
}

/// Invalidate a key prefix, logging instead of failing.
pub async fn invalidate_best_effort(cache: &dyn Cache, prefix: &str) {
    if let Err(e) = cache.invalidate_pattern(prefix).await {
        warn!(prefix, error = %e, "Cache invalidation failed, serving stale data");
    }
}

/// In-process cache used by tests and single-node deployments.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires)| *expires > Utc::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let expires = Utc::now() + Duration::seconds(ttl_seconds as i64);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn invalidate_pattern(&self, prefix: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}
