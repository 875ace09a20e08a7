use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, InMemoryCacheStore};

const CACHE_PREFIX: &str = "cache";

impl InMemoryCacheStore {
    pub(crate) fn new() -> Self {
        tracing::info!("Creating new in-memory generic cache store");
        Self {
            entry: HashMap::new(),
        }
    }

    fn make_key(prefix: &str, key: &str) -> String {
        format!("{CACHE_PREFIX}:{prefix}:{key}")
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(()) // Nothing to initialize for in-memory store
    }

    async fn put(&mut self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        self.entry.insert(key, (value, None));
        Ok(())
    }

    async fn put_with_ttl(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        let expires_at = Utc::now() + Duration::seconds(ttl as i64);
        self.entry.insert(key, (value, Some(expires_at)));
        Ok(())
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let key = Self::make_key(prefix, key);
        match self.entry.get(&key) {
            Some((_, Some(expires_at))) if *expires_at < Utc::now() => Ok(None),
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn remove(&mut self, prefix: &str, key: &str) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        self.entry.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_key() {
        let result = InMemoryCacheStore::make_key("rate", "user@example.com");
        assert_eq!(result, "cache:rate:user@example.com");
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let mut store = InMemoryCacheStore::new();
        let value = CacheData {
            value: "test value".to_string(),
        };

        store.put("test", "key1", value).await.unwrap();

        let retrieved = store.get("test", "key1").await.unwrap();
        assert_eq!(retrieved.unwrap().value, "test value");
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let store = InMemoryCacheStore::new();
        assert!(store.get("test", "nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let mut store = InMemoryCacheStore::new();
        let value = CacheData {
            value: "value to remove".to_string(),
        };

        store.put("test", "key3", value).await.unwrap();
        store.remove("test", "key3").await.unwrap();

        assert!(store.get("test", "key3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_nonexistent_key_is_ok() {
        let mut store = InMemoryCacheStore::new();
        assert!(store.remove("test", "nonexistent").await.is_ok());
    }

    #[tokio::test]
    async fn test_ttl_entry_visible_before_expiry() {
        let mut store = InMemoryCacheStore::new();
        let value = CacheData {
            value: "short lived".to_string(),
        };

        store.put_with_ttl("test", "ttl_key", value, 60).await.unwrap();

        let retrieved = store.get("test", "ttl_key").await.unwrap();
        assert_eq!(retrieved.unwrap().value, "short lived");
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let mut store = InMemoryCacheStore::new();
        let value = CacheData {
            value: "already stale".to_string(),
        };

        // Insert with an expiry in the past directly; put_with_ttl can only
        // produce future expiries.
        let key = InMemoryCacheStore::make_key("test", "stale");
        store
            .entry
            .insert(key, (value, Some(Utc::now() - Duration::seconds(1))));

        assert!(store.get("test", "stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_existing_key() {
        let mut store = InMemoryCacheStore::new();
        let original = CacheData {
            value: "original value".to_string(),
        };
        let new = CacheData {
            value: "new value".to_string(),
        };

        store.put("test", "key1", original).await.unwrap();
        store.put("test", "key1", new).await.unwrap();

        let retrieved = store.get("test", "key1").await.unwrap().unwrap();
        assert_eq!(retrieved.value, "new value");
    }

    #[tokio::test]
    async fn test_prefix_isolation() {
        let mut store = InMemoryCacheStore::new();
        let value1 = CacheData {
            value: "value for prefix1".to_string(),
        };
        let value2 = CacheData {
            value: "value for prefix2".to_string(),
        };

        store.put("prefix1", "same_key", value1).await.unwrap();
        store.put("prefix2", "same_key", value2).await.unwrap();

        let get1 = store.get("prefix1", "same_key").await.unwrap().unwrap();
        let get2 = store.get("prefix2", "same_key").await.unwrap().unwrap();
        assert_eq!(get1.value, "value for prefix1");
        assert_eq!(get2.value, "value for prefix2");

        store.remove("prefix1", "same_key").await.unwrap();
        assert!(store.get("prefix1", "same_key").await.unwrap().is_none());
        assert!(store.get("prefix2", "same_key").await.unwrap().is_some());
    }
}
