//! Pipeline initialization.
//!
//! Builds the storage backends selected by configuration and assembles them
//! into a [`TransformPipeline`]. The local backend is always created since it
//! holds the local cache tier; a `storage.cloud` section adds the S3 backend
//! and makes it the only origin store.

use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::TransformPipeline;
use crate::storage::{LocalStorage, S3Storage, StorageBackend};

/// Create all storage backends and the pipeline from configuration.
pub async fn build_pipeline(config: &Config) -> TransformPipeline {
    let storage = &config.storage;
    let local: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        storage.public_dir.clone(),
        storage.cache_dir.clone(),
    ));

    let cloud: Option<Arc<dyn StorageBackend>> = match &storage.cloud {
        Some(cloud_config) => {
            let backend = S3Storage::connect(cloud_config).await;
            tracing::info!(
                bucket = %cloud_config.bucket,
                region = %cloud_config.region,
                endpoint = cloud_config.endpoint.as_deref().unwrap_or("default"),
                "Cloud storage enabled"
            );
            Some(Arc::new(backend))
        }
        None => {
            tracing::info!(
                public_dir = %storage.public_dir.display(),
                "Serving origins from local storage"
            );
            None
        }
    };

    TransformPipeline::new(
        local,
        cloud,
        config.transform.clone(),
        &config.video,
        storage.scratch_dir.clone(),
    )
}
