use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use super::{StorageBackend, StorageError};
use crate::cache::CacheKey;

/// Filesystem-backed storage
#[derive(Debug, Clone)]
pub struct LocalStorage {
    public_dir: PathBuf,
    cache_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(public_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.as_str())
    }

    fn origin_path(&self, path: &str) -> PathBuf {
        self.public_dir.join(path)
    }
}

async fn is_file(path: &Path) -> Result<bool, StorageError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn read(path: &Path, name: &str) -> Result<Bytes, StorageError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Bytes::from(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound(name.to_string())),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn describe(&self) -> String {
        format!("the public folder ({})", self.public_dir.display())
    }

    async fn cache_exists(&self, key: &CacheKey) -> Result<bool, StorageError> {
        is_file(&self.cache_path(key)).await
    }

    async fn cache_fetch(&self, key: &CacheKey) -> Result<Bytes, StorageError> {
        read(&self.cache_path(key), key.as_str()).await
    }

    async fn cache_store(
        &self,
        key: &CacheKey,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        // Write to a unique temp file then rename so readers never see a partial entry
        let final_path = self.cache_path(key);
        let temp_path = self
            .cache_dir
            .join(format!(".{}.{}.tmp", key.as_str(), Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&temp_path, &data).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(
            cache_key = %key,
            path = %final_path.display(),
            size = data.len(),
            "Stored derivative in local cache"
        );
        Ok(())
    }

    async fn cache_remove(&self, key: &CacheKey) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.cache_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn origin_exists(&self, path: &str) -> Result<bool, StorageError> {
        is_file(&self.origin_path(path)).await
    }

    async fn origin_fetch(&self, path: &str) -> Result<Bytes, StorageError> {
        read(&self.origin_path(path), path).await
    }

    async fn origin_file(&self, path: &str) -> Option<PathBuf> {
        let full = self.origin_path(path);
        match is_file(&full).await {
            Ok(true) => Some(full),
            _ => None,
        }
    }
}
