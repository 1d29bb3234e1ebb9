use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{StorageBackend, StorageError};
use crate::cache::CacheKey;

/// In-memory storage with switchable failures
///
/// Stands in for either deployment mode in tests. Failure switches make
/// cache reads or writes return [`StorageError::Cloud`] so fallback paths
/// can be exercised without a real bucket.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    name: String,
    origins: RwLock<HashMap<String, Bytes>>,
    cache: RwLock<HashMap<String, (Bytes, String)>>,
    fail_cache_reads: AtomicBool,
    fail_cache_writes: AtomicBool,
    fail_origin_reads: AtomicBool,
    stores: AtomicUsize,
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_origin(self, path: &str, data: impl Into<Bytes>) -> Self {
        self.insert_origin(path, data);
        self
    }

    pub fn insert_origin(&self, path: &str, data: impl Into<Bytes>) {
        self.origins.write().insert(path.to_string(), data.into());
    }

    /// Cached bytes and content type stored under `key`
    pub fn cached_entry(&self, key: &CacheKey) -> Option<(Bytes, String)> {
        self.cache.read().get(key.as_str()).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Number of successful `cache_store` calls
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn fail_cache_reads(&self, fail: bool) {
        self.fail_cache_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cache_writes(&self, fail: bool) {
        self.fail_cache_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `origin_fetch` fail; existence checks still answer
    pub fn fail_origin_reads(&self, fail: bool) {
        self.fail_origin_reads.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Cloud(format!("{}: injected {} failure", self.name, op)));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn describe(&self) -> String {
        self.name.clone()
    }

    async fn cache_exists(&self, key: &CacheKey) -> Result<bool, StorageError> {
        self.check(&self.fail_cache_reads, "cache read")?;
        Ok(self.cache.read().contains_key(key.as_str()))
    }

    async fn cache_fetch(&self, key: &CacheKey) -> Result<Bytes, StorageError> {
        self.check(&self.fail_cache_reads, "cache read")?;
        self.cache
            .read()
            .get(key.as_str())
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn cache_store(
        &self,
        key: &CacheKey,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.check(&self.fail_cache_writes, "cache write")?;
        self.cache
            .write()
            .insert(key.to_string(), (data, content_type.to_string()));
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn cache_remove(&self, key: &CacheKey) -> Result<(), StorageError> {
        self.check(&self.fail_cache_writes, "cache write")?;
        self.cache.write().remove(key.as_str());
        Ok(())
    }

    async fn origin_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.origins.read().contains_key(path))
    }

    async fn origin_fetch(&self, path: &str) -> Result<Bytes, StorageError> {
        self.check(&self.fail_origin_reads, "origin read")?;
        self.origins
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}
