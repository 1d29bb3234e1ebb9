//! Storage backends for origin assets and cached derivatives
//!
//! Two deployment modes exist and are chosen once at startup:
//!
//! - **Local**: origins under `public_dir`, derivatives under `cache_dir`.
//! - **Cloud**: origins and derivatives in one S3-compatible bucket. The
//!   local cache directory still serves as the first write target and as a
//!   fallback read tier, but the local origin root is never consulted.
//!
//! Backends are handed to the pipeline as `Arc<dyn StorageBackend>`;
//! [`MemoryStorage`] is an in-process fake with failure injection for tests.

mod error;
mod local;
mod memory;
mod s3;

pub use error::StorageError;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use s3::S3Storage;

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::CacheKey;

/// Capability set shared by every storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Human-readable location, used in 404 messages and logs
    fn describe(&self) -> String;

    /// Whether a derivative is cached under `key`
    async fn cache_exists(&self, key: &CacheKey) -> Result<bool, StorageError>;

    /// Read a cached derivative; `NotFound` if absent
    async fn cache_fetch(&self, key: &CacheKey) -> Result<Bytes, StorageError>;

    /// Write a derivative; entries are write-once but a rewrite is harmless
    async fn cache_store(
        &self,
        key: &CacheKey,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Delete a cached derivative; absent entries are not an error
    async fn cache_remove(&self, key: &CacheKey) -> Result<(), StorageError>;

    /// Whether the origin asset exists
    async fn origin_exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Read the origin asset; `NotFound` if absent
    async fn origin_fetch(&self, path: &str) -> Result<Bytes, StorageError>;

    /// On-disk location of the origin, when the backend has one
    async fn origin_file(&self, _path: &str) -> Option<PathBuf> {
        None
    }
}
