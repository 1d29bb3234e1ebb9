use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{StorageBackend, StorageError};
use crate::cache::CacheKey;
use crate::config::CloudConfig;

/// S3-compatible object storage (AWS S3, R2, MinIO, LocalStack)
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    origin_prefix: String,
    cache_prefix: String,
    timeout: Duration,
}

impl S3Storage {
    /// Build a client from configuration
    ///
    /// Static keys in the config win; otherwise the default AWS provider
    /// chain (environment, profile, instance role) is used.
    pub async fn connect(config: &CloudConfig) -> Self {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "kagami-config",
                )),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(config.force_path_style);

        Self::from_client(
            Client::from_conf(builder.build()),
            config.bucket.clone(),
            config.origin_prefix.clone(),
            config.cache_prefix.clone(),
            config.timeout(),
        )
    }

    pub fn from_client(
        client: Client,
        bucket: impl Into<String>,
        origin_prefix: impl Into<String>,
        cache_prefix: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            origin_prefix: origin_prefix.into(),
            cache_prefix: cache_prefix.into(),
            timeout,
        }
    }

    fn cache_object(&self, key: &CacheKey) -> String {
        object_key(&self.cache_prefix, key.as_str())
    }

    fn origin_object(&self, path: &str) -> String {
        object_key(&self.origin_prefix, path)
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>> + Send,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn head(&self, object: String) -> Result<bool, StorageError> {
        let request = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object)
            .send();

        self.bounded(async move {
            match request.await {
                Ok(_) => Ok(true),
                Err(e)
                    if e.as_service_error()
                        .map(|se| se.is_not_found())
                        .unwrap_or(false) =>
                {
                    Ok(false)
                }
                Err(e) => Err(StorageError::Cloud(format!(
                    "HEAD s3://{}/{} failed: {}",
                    self.bucket,
                    object,
                    DisplayErrorContext(&e)
                ))),
            }
        })
        .await
    }

    async fn get(&self, object: String) -> Result<Bytes, StorageError> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object)
            .send();

        self.bounded(async move {
            let response = match request.await {
                Ok(response) => response,
                Err(e)
                    if e.as_service_error()
                        .map(|se| se.is_no_such_key())
                        .unwrap_or(false) =>
                {
                    return Err(StorageError::NotFound(object));
                }
                Err(e) => {
                    return Err(StorageError::Cloud(format!(
                        "GET s3://{}/{} failed: {}",
                        self.bucket,
                        object,
                        DisplayErrorContext(&e)
                    )))
                }
            };

            let body = response.body.collect().await.map_err(|e| {
                StorageError::Cloud(format!("Failed to read S3 body for {}: {}", object, e))
            })?;
            Ok(body.into_bytes())
        })
        .await
    }
}

/// Join a key prefix and a name with exactly one `/`
fn object_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn describe(&self) -> String {
        format!("your cloud storage bucket ({})", self.bucket)
    }

    async fn cache_exists(&self, key: &CacheKey) -> Result<bool, StorageError> {
        self.head(self.cache_object(key)).await
    }

    async fn cache_fetch(&self, key: &CacheKey) -> Result<Bytes, StorageError> {
        self.get(self.cache_object(key)).await
    }

    async fn cache_store(
        &self,
        key: &CacheKey,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let object = self.cache_object(key);
        let size = data.len();
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send();

        self.bounded(async {
            request.await.map_err(|e| {
                StorageError::Cloud(format!(
                    "PUT s3://{}/{} failed: {}",
                    self.bucket,
                    object,
                    DisplayErrorContext(&e)
                ))
            })
        })
        .await?;

        tracing::debug!(bucket = %self.bucket, object = %object, size, "Uploaded derivative");
        Ok(())
    }

    async fn cache_remove(&self, key: &CacheKey) -> Result<(), StorageError> {
        let object = self.cache_object(key);
        let request = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object)
            .send();

        self.bounded(async {
            request.await.map(|_| ()).map_err(|e| {
                StorageError::Cloud(format!(
                    "DELETE s3://{}/{} failed: {}",
                    self.bucket,
                    object,
                    DisplayErrorContext(&e)
                ))
            })
        })
        .await
    }

    async fn origin_exists(&self, path: &str) -> Result<bool, StorageError> {
        self.head(self.origin_object(path)).await
    }

    async fn origin_fetch(&self, path: &str) -> Result<Bytes, StorageError> {
        self.get(self.origin_object(path)).await
    }
}
