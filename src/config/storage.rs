//! Storage configuration types.
//!
//! The presence of a `cloud` section selects cloud mode for the whole
//! deployment; without it origins are served from `public_dir`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_DIR, DEFAULT_CLOUD_CACHE_PREFIX, DEFAULT_CLOUD_TIMEOUT_SECS, DEFAULT_PUBLIC_DIR,
    DEFAULT_SCRATCH_DIR,
};

fn default_public_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PUBLIC_DIR)
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SCRATCH_DIR)
}

fn default_cache_prefix() -> String {
    DEFAULT_CLOUD_CACHE_PREFIX.to_string()
}

fn default_force_path_style() -> bool {
    true
}

fn default_cloud_timeout() -> u64 {
    DEFAULT_CLOUD_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Origin root in local mode
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    /// Local derivative cache, used in both modes
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Per-request scratch files for video transcoding
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_dir: default_public_dir(),
            cache_dir: default_cache_dir(),
            scratch_dir: default_scratch_dir(),
            cloud: None,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, dir) in [
            ("public_dir", &self.public_dir),
            ("cache_dir", &self.cache_dir),
            ("scratch_dir", &self.scratch_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(format!("storage.{} cannot be empty", name));
            }
        }
        if let Some(cloud) = &self.cloud {
            cloud.validate()?;
        }
        Ok(())
    }
}

/// S3-compatible bucket settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for R2, MinIO or LocalStack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Key prefix under which origin assets live
    #[serde(default)]
    pub origin_prefix: String,
    /// Key prefix under which derivatives are written
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
    #[serde(default = "default_cloud_timeout")]
    pub timeout_secs: u64,
}

// Keep secrets out of logs
impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("origin_prefix", &self.origin_prefix)
            .field("cache_prefix", &self.cache_prefix)
            .field("force_path_style", &self.force_path_style)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl CloudConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bucket.trim().is_empty() {
            return Err("storage.cloud.bucket cannot be empty".to_string());
        }
        if self.region.trim().is_empty() {
            return Err("storage.cloud.region cannot be empty".to_string());
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(
                "storage.cloud.access_key and storage.cloud.secret_key must be set together"
                    .to_string(),
            );
        }
        if self.timeout_secs == 0 {
            return Err("storage.cloud.timeout_secs must be > 0".to_string());
        }
        Ok(())
    }
}
