// In-process read cache for orders and order lists

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Instant::now() > expires_at
        } else {
            false
        }
    }
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Removes every key starting with `prefix`, returning how many were dropped.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let hit = match self.store.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if hit.is_none() {
            self.store.remove(key);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.store
            .insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let before = self.store.len();
        self.store.retain(|k, _| !k.starts_with(prefix));
        Ok(before.saturating_sub(self.store.len()))
    }
}

/// Typed wrapper the services use: JSON values, a default TTL and key helpers.
///
/// Every invalidation bumps a generation counter. Readers take the generation
/// before going to the database and write back with [`QueryCache::set_json_at`],
/// which discards the value when an invalidation happened in between.
#[derive(Clone)]
pub struct QueryCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    generation: Arc<AtomicU64>,
}

impl QueryCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryCache::new()), ttl)
    }

    pub fn order_key(order_id: i32) -> String {
        format!("order:{}", order_id)
    }

    pub const ORDER_LIST_PREFIX: &'static str = "orders:list:";

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        if self.ttl.is_zero() {
            return Ok(());
        }
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw, Some(self.ttl)).await
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Caches a value read from the store at `generation`. Skipped, or undone,
    /// when an invalidation ran since then.
    pub async fn set_json_at<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        generation: u64,
    ) -> Result<bool, CacheError> {
        if self.generation() != generation {
            debug!(key, "stale read, not cached");
            return Ok(false);
        }
        self.set_json(key, value).await?;
        // An invalidation that slipped in between the check and the write
        if self.generation() != generation {
            self.backend.delete(key).await?;
            debug!(key, "stale read, cache write undone");
            return Ok(false);
        }
        Ok(true)
    }

    /// Drops the cached order and every cached list page.
    pub async fn invalidate_order(&self, order_id: i32) -> Result<(), CacheError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.backend.delete(&Self::order_key(order_id)).await?;
        let dropped = self.backend.delete_prefix(Self::ORDER_LIST_PREFIX).await?;
        debug!(order_id, dropped, "invalidated order cache");
        Ok(())
    }

    pub async fn invalidate_lists(&self) -> Result<(), CacheError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.backend.delete_prefix(Self::ORDER_LIST_PREFIX).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = InMemoryCache::new();
        cache
            .set("k", "v", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidate_order_drops_lists_too() {
        let backend = Arc::new(InMemoryCache::new());
        let cache = QueryCache::new(backend.clone(), Duration::from_secs(60));
        cache.set_json("order:1", &1u8).await.unwrap();
        cache.set_json("order:2", &2u8).await.unwrap();
        cache.set_json("orders:list:a", &vec![1u8]).await.unwrap();

        cache.invalidate_order(1).await.unwrap();

        assert_eq!(cache.get_json::<u8>("order:1").await.unwrap(), None);
        assert_eq!(cache.get_json::<u8>("order:2").await.unwrap(), Some(2));
        assert_eq!(cache.get_json::<Vec<u8>>("orders:list:a").await.unwrap(), None);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn reads_older_than_an_invalidation_are_not_cached() {
        let cache = QueryCache::in_memory(Duration::from_secs(60));
        let before = cache.generation();

        // A mutation commits while the reader still holds the old row
        cache.invalidate_order(1).await.unwrap();

        assert!(!cache.set_json_at("order:1", &"old", before).await.unwrap());
        assert_eq!(cache.get_json::<String>("order:1").await.unwrap(), None);

        let current = cache.generation();
        assert!(cache.set_json_at("order:1", &"new", current).await.unwrap());
        assert_eq!(
            cache.get_json::<String>("order:1").await.unwrap().as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn zero_ttl_disables_writes() {
        let cache = QueryCache::in_memory(Duration::ZERO);
        cache.set_json("order:1", &1u8).await.unwrap();
        assert_eq!(cache.get_json::<u8>("order:1").await.unwrap(), None);
    }
}
