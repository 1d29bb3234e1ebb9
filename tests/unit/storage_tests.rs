// Storage backend tests
// LocalStorage runs on tempfile directories; MemoryStorage covers failure injection

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

use kagami::cache::CacheKey;
use kagami::image_optimizer::ImageConfig;
use kagami::pipeline::{CacheStatus, TransformPipeline};
use kagami::storage::{LocalStorage, MemoryStorage, StorageBackend, StorageError};
use kagami::video::VideoConfig;

fn local_storage(dir: &TempDir) -> LocalStorage {
    LocalStorage::new(dir.path().join("public"), dir.path().join("cache"))
}

// Test: Local storage names itself after the public folder
#[test]
fn test_local_describe_names_public_dir() {
    let dir = TempDir::new().unwrap();
    let store = local_storage(&dir);
    let described = store.describe();
    assert!(described.starts_with("the public folder"));
    assert!(described.contains("public"));
}

// Test: Concurrent writers of one key leave a single complete entry
#[tokio::test]
async fn test_concurrent_stores_of_same_key() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(local_storage(&dir));
    let key = CacheKey::derive("/t/resize:10x10/cat.png");
    let payload = Bytes::from(vec![7u8; 64 * 1024]);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let key = key.clone();
        let payload = payload.clone();
        handles.push(tokio::spawn(async move {
            store.cache_store(&key, payload, "image/png").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.cache_fetch(&key).await.unwrap(), payload);
    let entries = std::fs::read_dir(store.cache_dir()).unwrap().count();
    assert_eq!(entries, 1, "temp files must not survive");
}

// Test: Local mode pipeline writes the derivative under its key on disk
#[tokio::test]
async fn test_local_mode_end_to_end_on_disk() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("public/img")).unwrap();

    let img = RgbaImage::from_pixel(50, 30, Rgba([10, 120, 200, 128]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    std::fs::write(dir.path().join("public/img/logo.png"), buf.into_inner()).unwrap();

    let pipeline = TransformPipeline::new(
        Arc::new(local_storage(&dir)),
        None,
        ImageConfig::default(),
        &VideoConfig::default(),
        dir.path().join("temp"),
    );

    let path = "/t/resize:25x15/img/logo.png";
    let response = pipeline.resolve(path).await.unwrap();
    assert_eq!(response.cache_status, CacheStatus::Miss);
    assert_eq!(response.content_type, "image/png");

    let on_disk = std::fs::read(dir.path().join("cache").join(CacheKey::derive(path).as_str())).unwrap();
    assert_eq!(Bytes::from(on_disk), response.body);

    let again = pipeline.resolve(path).await.unwrap();
    assert_eq!(again.cache_status, CacheStatus::HitLocal);
    assert_eq!(again.body, response.body);
}

// Test: Path traversal never reaches the disk
#[tokio::test]
async fn test_traversal_rejected_before_disk() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("secret.png"), b"top secret").unwrap();

    let pipeline = TransformPipeline::new(
        Arc::new(local_storage(&dir)),
        None,
        ImageConfig::default(),
        &VideoConfig::default(),
        dir.path().join("temp"),
    );

    let err = pipeline.resolve("/t/resize:10x10/../secret.png").await.unwrap_err();
    assert_eq!(err.to_http_status(), 400);
    assert!(!dir.path().join("cache").exists());
}

// Test: Memory storage failure switches surface as cloud errors
#[tokio::test]
async fn test_memory_failure_switches() {
    let store = MemoryStorage::new("memory").with_origin("a.png", "png");
    let key = CacheKey::derive("/t/a.png");

    store.fail_cache_writes(true);
    let err = store
        .cache_store(&key, Bytes::from_static(b"x"), "image/png")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Cloud(_)));
    assert_eq!(store.store_count(), 0);

    store.fail_cache_writes(false);
    store
        .cache_store(&key, Bytes::from_static(b"x"), "image/png")
        .await
        .unwrap();
    assert_eq!(store.store_count(), 1);

    store.fail_cache_reads(true);
    assert!(store.cache_exists(&key).await.is_err());

    store.fail_origin_reads(true);
    assert!(store.origin_fetch("a.png").await.is_err());
    assert!(store.origin_exists("a.png").await.unwrap());
}
