//! Request resolution pipeline
//!
//! Turns a transformation request path into response bytes by walking a
//! fixed sequence of gates, stopping at the first one that answers:
//!
//! 1. cloud cache hit (cloud mode only)
//! 2. local cache hit
//! 3. origin missing → 404
//! 4. transform (unsupported extension → 400, failure → 500)
//! 5. persist to the local tier, then upload to the cloud tier and drop the
//!    local copy once the upload succeeded; this step runs on a spawned task
//!
//! Cache read errors are never fatal; they count as a miss and resolution
//! carries on with the next gate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use crate::cache::CacheKey;
use crate::directive::{parse_request_path, ParsedRequest};
use crate::error::PipelineError;
use crate::image_optimizer::{process_image_bounded, ImageConfig, ImageParams, OutputFormat};
use crate::media::MediaKind;
use crate::metrics::PipelineMetrics;
use crate::scratch::ScratchFile;
use crate::storage::StorageBackend;
use crate::video::{VideoConfig, VideoContainer, VideoParams, VideoTranscoder};

/// Which tier answered a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    HitCloud,
    HitLocal,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` response header
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::HitCloud => "HIT-CLOUD",
            CacheStatus::HitLocal => "HIT-LOCAL",
            CacheStatus::Miss => "MISS",
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            CacheStatus::HitCloud => "hit_cloud",
            CacheStatus::HitLocal => "hit_local",
            CacheStatus::Miss => "miss",
        }
    }
}

/// Successful resolution
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub body: Bytes,
    pub content_type: &'static str,
    pub cache_status: CacheStatus,
}

/// Orchestrates storage and transformation for one deployment
pub struct TransformPipeline {
    local: Arc<dyn StorageBackend>,
    cloud: Option<Arc<dyn StorageBackend>>,
    image_config: ImageConfig,
    video: VideoTranscoder,
    scratch_dir: PathBuf,
}

impl TransformPipeline {
    /// `local` always serves as the local cache tier. With `cloud` set, the
    /// bucket is the only origin store and the local origin root is ignored.
    pub fn new(
        local: Arc<dyn StorageBackend>,
        cloud: Option<Arc<dyn StorageBackend>>,
        image_config: ImageConfig,
        video_config: &VideoConfig,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            local,
            cloud,
            image_config,
            video: VideoTranscoder::new(video_config),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn is_cloud_mode(&self) -> bool {
        self.cloud.is_some()
    }

    /// Human-readable name of the authoritative origin store
    pub fn origin_store_name(&self) -> String {
        self.origin_store().describe()
    }

    fn origin_store(&self) -> &Arc<dyn StorageBackend> {
        self.cloud.as_ref().unwrap_or(&self.local)
    }

    /// Resolve a request path (without query string) to a derivative
    pub async fn resolve(&self, request_path: &str) -> Result<PipelineResponse, PipelineError> {
        let metrics = PipelineMetrics::global();
        let result = self.resolve_inner(request_path).await;
        match &result {
            Ok(response) => metrics.record_request(response.cache_status.outcome()),
            Err(e) => metrics.record_request(e.outcome()),
        }
        result
    }

    async fn resolve_inner(&self, request_path: &str) -> Result<PipelineResponse, PipelineError> {
        let parsed = parse_request_path(request_path);
        parsed.validate_origin()?;

        let key = CacheKey::derive(request_path);
        let kind = MediaKind::from_extension(parsed.extension.as_deref());
        let content_type = kind.response_content_type(&parsed.spec);

        if let Some(cloud) = &self.cloud {
            if let Some(body) = lookup(cloud.as_ref(), "cloud", &key).await {
                return Ok(PipelineResponse {
                    body,
                    content_type,
                    cache_status: CacheStatus::HitCloud,
                });
            }
        }

        if let Some(body) = lookup(self.local.as_ref(), "local", &key).await {
            return Ok(PipelineResponse {
                body,
                content_type,
                cache_status: CacheStatus::HitLocal,
            });
        }

        let origin = self.origin_store();
        let exists = match origin.origin_exists(&parsed.origin_path).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(
                    path = %parsed.origin_path,
                    store = %origin.describe(),
                    error = %e,
                    "Origin existence check failed, treating as missing"
                );
                false
            }
        };
        if !exists {
            tracing::info!(path = %parsed.origin_path, store = %origin.describe(), "Origin not found");
            return Err(PipelineError::NotFound {
                path: parsed.origin_path,
                store: origin.describe(),
            });
        }

        let started = Instant::now();
        let result = match kind {
            MediaKind::Image(source) => self.transform_image(&parsed, source).await,
            MediaKind::Video(source) => self.transform_video(&parsed, source).await,
            MediaKind::Unsupported => return Err(PipelineError::UnsupportedType),
        };
        let elapsed = started.elapsed();
        PipelineMetrics::global().observe_transform(kind.label(), elapsed.as_secs_f64());

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(
                    path = %parsed.origin_path,
                    spec = %parsed.spec,
                    error = %e,
                    "Transformation failed"
                );
                return Err(e);
            }
        };

        tracing::debug!(
            cache_key = %key,
            kind = kind.label(),
            size = body.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Transformed derivative"
        );

        // Runs to completion even if this future is dropped by the request timeout
        let persisting = tokio::spawn(persist(
            self.local.clone(),
            self.cloud.clone(),
            key,
            body.clone(),
            content_type,
        ));
        if let Err(e) = persisting.await {
            tracing::warn!(error = %e, "Persist task failed");
        }

        Ok(PipelineResponse {
            body,
            content_type,
            cache_status: CacheStatus::Miss,
        })
    }

    async fn transform_image(
        &self,
        parsed: &ParsedRequest,
        source: OutputFormat,
    ) -> Result<Bytes, PipelineError> {
        let data = self.origin_store().origin_fetch(&parsed.origin_path).await?;
        let params = ImageParams::from_spec(&parsed.spec, &self.image_config);
        let processed =
            process_image_bounded(data, params, source, self.image_config.clone()).await?;
        Ok(Bytes::from(processed.data))
    }

    async fn transform_video(
        &self,
        parsed: &ParsedRequest,
        source: VideoContainer,
    ) -> Result<Bytes, PipelineError> {
        let params = VideoParams::from_spec(&parsed.spec, source, &self.image_config);
        let origin = self.origin_store();

        // The guard must outlive the transcode; it deletes the staged copy on drop
        let (input, _staged) = match origin.origin_file(&parsed.origin_path).await {
            Some(path) => (path, None),
            None => {
                let data = origin.origin_fetch(&parsed.origin_path).await?;
                let staged = ScratchFile::write(&self.scratch_dir, &parsed.origin_path, &data)
                    .await
                    .map_err(|e| {
                        PipelineError::Internal(format!("failed to stage origin: {}", e))
                    })?;
                (staged.path().to_path_buf(), Some(staged))
            }
        };

        let output = self
            .video
            .transcode(&input, &params, &self.scratch_dir)
            .await?;
        Ok(Bytes::from(output))
    }
}

/// Write a fresh derivative to the local tier, then move it to the cloud tier
async fn persist(
    local: Arc<dyn StorageBackend>,
    cloud: Option<Arc<dyn StorageBackend>>,
    key: CacheKey,
    body: Bytes,
    content_type: &'static str,
) {
    let stored_locally = match local.cache_store(&key, body.clone(), content_type).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(cache_key = %key, error = %e, "Failed to write local cache");
            false
        }
    };

    let Some(cloud) = cloud else {
        return;
    };

    match cloud.cache_store(&key, body, content_type).await {
        Ok(()) => {
            if stored_locally {
                if let Err(e) = local.cache_remove(&key).await {
                    tracing::warn!(
                        cache_key = %key,
                        error = %e,
                        "Failed to drop local copy after cloud upload"
                    );
                }
            }
        }
        Err(e) => {
            tracing::warn!(
                cache_key = %key,
                error = %e,
                "Cloud upload failed, derivative stays in local cache"
            );
            PipelineMetrics::global().cloud_upload_failures.inc();
        }
    }
}

/// Check one cache tier; every failure reads as a miss
async fn lookup(store: &dyn StorageBackend, tier: &'static str, key: &CacheKey) -> Option<Bytes> {
    let metrics = PipelineMetrics::global();

    match store.cache_exists(key).await {
        Ok(true) => {}
        Ok(false) => {
            metrics.record_lookup(tier, "miss");
            return None;
        }
        Err(e) => {
            tracing::warn!(tier, cache_key = %key, error = %e, "Cache check failed, falling back");
            metrics.record_lookup(tier, "error");
            return None;
        }
    }

    match store.cache_fetch(key).await {
        Ok(body) => {
            metrics.record_lookup(tier, "hit");
            Some(body)
        }
        Err(e) => {
            tracing::warn!(tier, cache_key = %key, error = %e, "Cache read failed, falling back");
            metrics.record_lookup(tier, "error");
            None
        }
    }
}
