// Resolution pipeline tests
// Drives TransformPipeline end to end over in-memory and mocked storage

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba};
use mockall::mock;
use tokio::sync::Notify;

use kagami::cache::CacheKey;
use kagami::error::PipelineError;
use kagami::image_optimizer::{EncoderFactory, EncoderQuality, ImageConfig, OutputFormat};
use kagami::pipeline::{CacheStatus, TransformPipeline};
use kagami::storage::{MemoryStorage, StorageBackend, StorageError};
use kagami::video::VideoConfig;

fn encoded(width: u32, height: u32, format: ImageFormat) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .expect("encode test image");
    Bytes::from(buf.into_inner())
}

fn dimensions(data: &[u8]) -> (u32, u32) {
    image::load_from_memory(data)
        .expect("decode derivative")
        .dimensions()
}

fn local_pipeline(local: Arc<MemoryStorage>) -> TransformPipeline {
    TransformPipeline::new(
        local,
        None,
        ImageConfig::default(),
        &VideoConfig::default(),
        std::env::temp_dir(),
    )
}

fn cloud_pipeline(local: Arc<MemoryStorage>, cloud: Arc<dyn StorageBackend>) -> TransformPipeline {
    TransformPipeline::new(
        local,
        Some(cloud),
        ImageConfig::default(),
        &VideoConfig::default(),
        std::env::temp_dir(),
    )
}

// Test: A miss transforms, caches locally, and the repeat is a byte-identical hit
#[tokio::test]
async fn test_miss_then_local_hit_is_identical() {
    let local = Arc::new(
        MemoryStorage::new("the public folder").with_origin("cat.png", encoded(64, 48, ImageFormat::Png)),
    );
    let pipeline = local_pipeline(local.clone());
    let path = "/t/resize:32x24/format:webp/cat.png";

    let first = pipeline.resolve(path).await.unwrap();
    assert_eq!(first.cache_status, CacheStatus::Miss);
    assert_eq!(first.content_type, "image/webp");
    assert_eq!(&first.body[0..4], b"RIFF");
    assert_eq!(local.cache_len(), 1);

    let second = pipeline.resolve(path).await.unwrap();
    assert_eq!(second.cache_status, CacheStatus::HitLocal);
    assert_eq!(second.body, first.body);
    assert_eq!(second.content_type, first.content_type);
}

// Test: Reordered directives are distinct cache entries
#[tokio::test]
async fn test_reordered_directives_cache_separately() {
    let local = Arc::new(
        MemoryStorage::new("local").with_origin("cat.jpg", encoded(40, 40, ImageFormat::Jpeg)),
    );
    let pipeline = local_pipeline(local.clone());

    pipeline.resolve("/t/format:png/quality:80/cat.jpg").await.unwrap();
    let second = pipeline
        .resolve("/t/quality:80/format:png/cat.jpg")
        .await
        .unwrap();

    assert_eq!(second.cache_status, CacheStatus::Miss);
    assert_eq!(local.cache_len(), 2);
}

// Test: crop:fit letterboxes to the exact box
#[tokio::test]
async fn test_crop_fit_pads_to_exact_box() {
    let local = Arc::new(
        MemoryStorage::new("local").with_origin("square.png", encoded(300, 300, ImageFormat::Png)),
    );
    let response = local_pipeline(local)
        .resolve("/t/resize:200x100/crop:fit/background:000/square.png")
        .await
        .unwrap();

    assert_eq!(dimensions(&response.body), (200, 100));
    let img = image::load_from_memory(&response.body).unwrap().to_rgb8();
    assert_eq!(img.get_pixel(2, 50), &Rgb([0, 0, 0]), "left band is padding");
}

// Test: crop:scale stretches to the exact box
#[tokio::test]
async fn test_crop_scale_exact_box() {
    let local = Arc::new(
        MemoryStorage::new("local").with_origin("square.png", encoded(300, 300, ImageFormat::Png)),
    );
    let response = local_pipeline(local)
        .resolve("/t/resize:200x100/crop:scale/square.png")
        .await
        .unwrap();

    assert_eq!(dimensions(&response.body), (200, 100));
    let img = image::load_from_memory(&response.body).unwrap().to_rgb8();
    let px = img.get_pixel(2, 50);
    assert!(px[0] > 180 && px[1] < 60, "no padding, got {:?}", px);
}

// Test: A malformed resize leaves dimensions alone but other directives still apply
#[tokio::test]
async fn test_malformed_resize_is_ignored() {
    let local = Arc::new(
        MemoryStorage::new("local").with_origin("cat.png", encoded(80, 60, ImageFormat::Png)),
    );
    let pipeline = local_pipeline(local);

    for path in [
        "/t/resize:abcx100/format:jpeg/cat.png",
        "/t/resize:0x100/format:jpeg/cat.png",
        "/t/resize:-5x-5/format:jpeg/cat.png",
    ] {
        let response = pipeline.resolve(path).await.unwrap();
        assert_eq!(dimensions(&response.body), (80, 60), "{}", path);
        assert_eq!(response.content_type, "image/jpeg", "{}", path);
    }
}

// Test: Missing origin is a 404 and nothing is cached
#[tokio::test]
async fn test_missing_origin_is_not_found() {
    let local = Arc::new(MemoryStorage::new("the public folder"));
    let err = local_pipeline(local.clone())
        .resolve("/t/format:webp/quality:80/cat.jpg")
        .await
        .unwrap_err();

    assert_eq!(err.to_http_status(), 404);
    assert_eq!(
        err.to_string(),
        "File not found: cat.jpg. Make sure the file exists in the public folder."
    );
    assert_eq!(local.store_count(), 0);
}

// Test: Existence check runs before the type check
#[tokio::test]
async fn test_unsupported_type_gate_order() {
    let local = Arc::new(MemoryStorage::new("local").with_origin("notes.txt", "hello"));
    let pipeline = local_pipeline(local.clone());

    let err = pipeline.resolve("/t/resize:10x10/notes.txt").await.unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedType));
    assert_eq!(err.to_http_status(), 400);

    let err = pipeline.resolve("/t/resize:10x10/missing.txt").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { .. }));
    assert_eq!(local.store_count(), 0);
}

// Test: Corrupt source is a 500 with no cache write
#[tokio::test]
async fn test_corrupt_image_is_transform_failure() {
    let local = Arc::new(MemoryStorage::new("local").with_origin("broken.jpg", "not a jpeg"));
    let err = local_pipeline(local.clone())
        .resolve("/t/resize:10x10/broken.jpg")
        .await
        .unwrap_err();

    assert_eq!(err.to_http_status(), 500);
    assert!(err.to_string().starts_with("Processing failed: "));
    assert_eq!(local.store_count(), 0);
}

// Test: A failing origin read after a positive existence check is a 500
#[tokio::test]
async fn test_origin_read_failure_is_500() {
    let local = Arc::new(
        MemoryStorage::new("local").with_origin("cat.png", encoded(10, 10, ImageFormat::Png)),
    );
    local.fail_origin_reads(true);

    let err = local_pipeline(local)
        .resolve("/t/resize:5x5/cat.png")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Origin(_)));
    assert_eq!(err.to_http_status(), 500);
}

// Test: A local cache write failure still serves the derivative
#[tokio::test]
async fn test_local_write_failure_still_serves() {
    let local = Arc::new(
        MemoryStorage::new("local").with_origin("cat.png", encoded(10, 10, ImageFormat::Png)),
    );
    local.fail_cache_writes(true);

    let response = local_pipeline(local.clone())
        .resolve("/t/resize:5x5/cat.png")
        .await
        .unwrap();
    assert_eq!(response.cache_status, CacheStatus::Miss);
    assert_eq!(local.cache_len(), 0);
}

// Test: Cloud mode ignores origins that only exist on local disk
#[tokio::test]
async fn test_cloud_mode_ignores_local_origin() {
    let local = Arc::new(
        MemoryStorage::new("the public folder").with_origin("cat.png", encoded(10, 10, ImageFormat::Png)),
    );
    let cloud = Arc::new(MemoryStorage::new("your cloud storage bucket (media)"));

    let err = cloud_pipeline(local, cloud)
        .resolve("/t/resize:5x5/cat.png")
        .await
        .unwrap_err();
    assert_eq!(err.to_http_status(), 404);
    assert!(err.to_string().contains("your cloud storage bucket (media)"));
}

// Test: Successful upload removes the local copy and later hits come from the cloud
#[tokio::test]
async fn test_cloud_upload_moves_entry_out_of_local_tier() {
    let local = Arc::new(MemoryStorage::new("local"));
    let cloud = Arc::new(
        MemoryStorage::new("bucket").with_origin("cat.png", encoded(20, 20, ImageFormat::Png)),
    );
    let pipeline = cloud_pipeline(local.clone(), cloud.clone());
    let path = "/t/resize:10x10/cat.png";
    let key = CacheKey::derive(path);

    let first = pipeline.resolve(path).await.unwrap();
    assert_eq!(first.cache_status, CacheStatus::Miss);
    assert!(local.cached_entry(&key).is_none());
    let (stored, content_type) = cloud.cached_entry(&key).unwrap();
    assert_eq!(stored, first.body);
    assert_eq!(content_type, "image/png");

    let second = pipeline.resolve(path).await.unwrap();
    assert_eq!(second.cache_status, CacheStatus::HitCloud);
    assert_eq!(second.body, first.body);
}

// Test: Failed upload keeps the local copy and serves it next time
#[tokio::test]
async fn test_cloud_upload_failure_keeps_local_copy() {
    let local = Arc::new(MemoryStorage::new("local"));
    let cloud = Arc::new(
        MemoryStorage::new("bucket").with_origin("cat.png", encoded(20, 20, ImageFormat::Png)),
    );
    cloud.fail_cache_writes(true);
    let pipeline = cloud_pipeline(local.clone(), cloud.clone());
    let path = "/t/resize:10x10/cat.png";

    let first = pipeline.resolve(path).await.unwrap();
    assert_eq!(first.cache_status, CacheStatus::Miss);
    assert!(local.cached_entry(&CacheKey::derive(path)).is_some());
    assert_eq!(cloud.cache_len(), 0);

    let second = pipeline.resolve(path).await.unwrap();
    assert_eq!(second.cache_status, CacheStatus::HitLocal);
}

// Test: A failing cloud cache read falls back to the local tier
#[tokio::test]
async fn test_cloud_read_failure_falls_back_to_local() {
    let local = Arc::new(MemoryStorage::new("local"));
    let cloud = Arc::new(MemoryStorage::new("bucket"));
    let path = "/t/format:png/cat.jpg";
    local
        .cache_store(&CacheKey::derive(path), Bytes::from_static(b"local copy"), "image/png")
        .await
        .unwrap();
    cloud.fail_cache_reads(true);

    let response = cloud_pipeline(local, cloud).resolve(path).await.unwrap();
    assert_eq!(response.cache_status, CacheStatus::HitLocal);
    assert_eq!(response.body, Bytes::from_static(b"local copy"));
}

mock! {
    pub Bucket {}

    #[async_trait]
    impl StorageBackend for Bucket {
        fn describe(&self) -> String;
        async fn cache_exists(&self, key: &CacheKey) -> Result<bool, StorageError>;
        async fn cache_fetch(&self, key: &CacheKey) -> Result<Bytes, StorageError>;
        async fn cache_store(
            &self,
            key: &CacheKey,
            data: Bytes,
            content_type: &str,
        ) -> Result<(), StorageError>;
        async fn cache_remove(&self, key: &CacheKey) -> Result<(), StorageError>;
        async fn origin_exists(&self, path: &str) -> Result<bool, StorageError>;
        async fn origin_fetch(&self, path: &str) -> Result<Bytes, StorageError>;
        async fn origin_file(&self, path: &str) -> Option<PathBuf>;
    }
}

// Test: A cloud cache-check failure falls through to origin and transformation
#[tokio::test]
async fn test_cloud_check_failure_falls_back_to_origin() {
    let source = encoded(16, 16, ImageFormat::Png);

    let mut bucket = MockBucket::new();
    bucket.expect_describe().return_const("bucket".to_string());
    bucket
        .expect_cache_exists()
        .times(1)
        .returning(|_| Err(StorageError::Timeout(20)));
    bucket.expect_cache_fetch().times(0);
    bucket
        .expect_origin_exists()
        .withf(|path| path == "cat.png")
        .times(1)
        .returning(|_| Ok(true));
    bucket
        .expect_origin_fetch()
        .times(1)
        .returning(move |_| Ok(source.clone()));
    bucket
        .expect_cache_store()
        .times(1)
        .returning(|_, _, _| Ok(()));

    let local = Arc::new(MemoryStorage::new("local"));
    let response = cloud_pipeline(local.clone(), Arc::new(bucket))
        .resolve("/t/resize:8x8/cat.png")
        .await
        .unwrap();

    assert_eq!(response.cache_status, CacheStatus::Miss);
    assert_eq!(dimensions(&response.body), (8, 8));
    assert_eq!(local.cache_len(), 0, "local copy dropped after upload");
}

// Test: An error while checking the origin reads as not found
#[tokio::test]
async fn test_origin_check_error_is_not_found() {
    let mut bucket = MockBucket::new();
    bucket.expect_describe().return_const("bucket".to_string());
    bucket.expect_cache_exists().returning(|_| Ok(false));
    bucket
        .expect_origin_exists()
        .returning(|_| Err(StorageError::Cloud("connection reset".to_string())));
    bucket.expect_origin_fetch().times(0);

    let err = cloud_pipeline(Arc::new(MemoryStorage::new("local")), Arc::new(bucket))
        .resolve("/t/cat.png")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { ref store, .. } if store == "bucket"));
}

// Test: Staged video input is cleaned up when the transcoder cannot start
#[tokio::test]
async fn test_video_failure_leaves_scratch_empty() {
    let scratch = tempfile::tempdir().unwrap();
    let cloud = Arc::new(MemoryStorage::new("bucket").with_origin("clip.mp4", "fake mp4 bytes"));
    let video = VideoConfig {
        ffmpeg_path: "/nonexistent/bin/ffmpeg".to_string(),
        ..VideoConfig::default()
    };
    let pipeline = TransformPipeline::new(
        Arc::new(MemoryStorage::new("local")),
        Some(cloud.clone() as Arc<dyn StorageBackend>),
        ImageConfig::default(),
        &video,
        scratch.path(),
    );

    let err = pipeline
        .resolve("/t/resize:320x240/clip.mp4")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Video(_)));
    assert_eq!(err.to_http_status(), 500);
    assert_eq!(cloud.cache_len(), 0);

    let leftovers = std::fs::read_dir(scratch.path()).unwrap().count();
    assert_eq!(leftovers, 0, "scratch dir should be empty");
}

// Test: A successful transcode uploads the result and leaves no scratch files
#[cfg(unix)]
#[tokio::test]
async fn test_video_success_leaves_scratch_empty() {
    use std::os::unix::fs::PermissionsExt;

    // stand-in for ffmpeg: copy the -i input to the last argument
    let bin = tempfile::tempdir().unwrap();
    let ffmpeg = bin.path().join("ffmpeg");
    std::fs::write(
        &ffmpeg,
        "#!/bin/sh\nin=\"\"\nprev=\"\"\nfor arg in \"$@\"; do\n  if [ \"$prev\" = \"-i\" ]; then in=\"$arg\"; fi\n  prev=\"$arg\"\ndone\ncp \"$in\" \"$prev\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let local = Arc::new(MemoryStorage::new("local"));
    let cloud = Arc::new(MemoryStorage::new("bucket").with_origin("clip.mp4", "fake mp4 bytes"));
    let video = VideoConfig {
        ffmpeg_path: ffmpeg.to_string_lossy().into_owned(),
        ..VideoConfig::default()
    };
    let pipeline = TransformPipeline::new(
        local.clone(),
        Some(cloud.clone() as Arc<dyn StorageBackend>),
        ImageConfig::default(),
        &video,
        scratch.path(),
    );

    let path = "/t/resize:320x240/clip.mp4";
    let response = pipeline.resolve(path).await.unwrap();
    assert_eq!(response.cache_status, CacheStatus::Miss);
    assert_eq!(response.content_type, "video/mp4");
    assert_eq!(response.body, Bytes::from_static(b"fake mp4 bytes"));

    let (uploaded, content_type) = cloud.cached_entry(&CacheKey::derive(path)).unwrap();
    assert_eq!(uploaded, response.body);
    assert_eq!(content_type, "video/mp4");
    assert_eq!(local.cache_len(), 0);

    let leftovers = std::fs::read_dir(scratch.path()).unwrap().count();
    assert_eq!(leftovers, 0, "scratch dir should be empty");
}

// Test: An AVIF origin is decoded and transformed
#[tokio::test]
async fn test_avif_origin_transforms() {
    let rgba: Vec<u8> = [30u8, 160, 60, 255].repeat(24 * 16);
    let avif = EncoderFactory::create(OutputFormat::Avif, Rgba([255, 255, 255, 255]))
        .encode(&rgba, 24, 16, EncoderQuality::with_quality(90))
        .unwrap()
        .data;
    let local = Arc::new(MemoryStorage::new("local").with_origin("pic.avif", avif));

    let pipeline = local_pipeline(local.clone());
    let response = pipeline.resolve("/t/resize:8x8/format:png/pic.avif").await.unwrap();
    assert_eq!(response.cache_status, CacheStatus::Miss);
    assert_eq!(response.content_type, "image/png");
    assert_eq!(dimensions(&response.body), (8, 8));

    let img = image::load_from_memory(&response.body).unwrap().to_rgb8();
    let px = img.get_pixel(4, 4);
    assert!(px[1] > 110 && px[0] < 90, "expected green, got {:?}", px);

    let plain = pipeline.resolve("/t/pic.avif").await.unwrap();
    assert_eq!(plain.content_type, "image/avif");
    assert_eq!(&plain.body[4..8], b"ftyp");
}

// Test: An extreme-aspect source under fill or crop stays within the box size
#[tokio::test]
async fn test_fill_extreme_aspect_source() {
    let local = Arc::new(
        MemoryStorage::new("local").with_origin("strip.png", encoded(2000, 1, ImageFormat::Png)),
    );
    let pipeline = local_pipeline(local);

    for path in [
        "/t/resize:2000x2000/crop:fill/strip.png",
        "/t/resize:2000x2000/crop:crop/strip.png",
    ] {
        let response = pipeline.resolve(path).await.unwrap();
        assert_eq!(dimensions(&response.body), (2000, 2000), "{}", path);
    }
}

/// Cloud tier whose uploads wait for the test to release them
struct GatedBucket {
    inner: MemoryStorage,
    upload_started: Notify,
    release_upload: Notify,
}

#[async_trait]
impl StorageBackend for GatedBucket {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    async fn cache_exists(&self, key: &CacheKey) -> Result<bool, StorageError> {
        self.inner.cache_exists(key).await
    }

    async fn cache_fetch(&self, key: &CacheKey) -> Result<Bytes, StorageError> {
        self.inner.cache_fetch(key).await
    }

    async fn cache_store(
        &self,
        key: &CacheKey,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.upload_started.notify_one();
        self.release_upload.notified().await;
        self.inner.cache_store(key, data, content_type).await
    }

    async fn cache_remove(&self, key: &CacheKey) -> Result<(), StorageError> {
        self.inner.cache_remove(key).await
    }

    async fn origin_exists(&self, path: &str) -> Result<bool, StorageError> {
        self.inner.origin_exists(path).await
    }

    async fn origin_fetch(&self, path: &str) -> Result<Bytes, StorageError> {
        self.inner.origin_fetch(path).await
    }
}

// Test: Dropping a request mid-upload still finishes the upload and local cleanup
#[tokio::test]
async fn test_abandoned_request_completes_upload() {
    let local = Arc::new(MemoryStorage::new("local"));
    let bucket = Arc::new(GatedBucket {
        inner: MemoryStorage::new("bucket").with_origin("cat.png", encoded(20, 20, ImageFormat::Png)),
        upload_started: Notify::new(),
        release_upload: Notify::new(),
    });
    let pipeline = cloud_pipeline(local.clone(), bucket.clone());
    let path = "/t/resize:10x10/cat.png";
    let key = CacheKey::derive(path);

    tokio::select! {
        _ = pipeline.resolve(path) => panic!("upload is gated, resolve cannot finish"),
        _ = bucket.upload_started.notified() => {}
    }
    // the request future is gone; the local copy was written before the upload
    assert!(local.cached_entry(&key).is_some());

    bucket.release_upload.notify_one();
    for _ in 0..200 {
        if local.cache_len() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(bucket.inner.cached_entry(&key).is_some());
    assert!(local.cached_entry(&key).is_none());

    let again = pipeline.resolve(path).await.unwrap();
    assert_eq!(again.cache_status, CacheStatus::HitCloud);
}
