use crate::keys::{validate_key, validate_prefix};
use crate::traits::{ObjectUpload, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult, WriteMultipart,
};
use std::time::{Duration, Instant};

/// Size of each multipart part. S3 requires at least 5 MiB for all but the
/// last part.
const MULTIPART_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Parts allowed in flight before `write` waits.
const MULTIPART_MAX_CONCURRENCY: usize = 4;

/// Address an object by its raw key.
///
/// `Path::parse` keeps the key as-is, so a key returned by `list` addresses
/// the same object. `Path::from` would percent-encode characters such as
/// `[`, `~` or `%`.
fn object_location(storage_key: &str) -> StorageResult<Path> {
    validate_key(storage_key)?;
    Path::parse(storage_key).map_err(|e| {
        StorageError::InvalidKey(format!("Invalid storage key {}: {}", storage_key, e))
    })
}

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:4566" for LocalStack, "http://localhost:9000" for MinIO)
    pub fn new(bucket: String, region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        // Credentials come from the environment (or the instance/task role).
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }
}

#[async_trait]
impl Storage for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        validate_prefix(prefix)?;
        let start = Instant::now();
        let trimmed = prefix.trim_end_matches('/');
        let location = if trimmed.is_empty() {
            None
        } else {
            Some(object_location(trimmed)?)
        };

        let result: ObjectResult<Vec<_>> = self.store.list(location.as_ref()).try_collect().await;

        let objects = result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                prefix = %prefix,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 list failed"
            );
            StorageError::ListFailed(e.to_string())
        })?;

        let keys: Vec<String> = objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect();

        tracing::info!(
            bucket = %self.bucket,
            prefix = %prefix,
            object_count = keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 list successful"
        );

        Ok(keys)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let location = object_location(storage_key)?;
        let start = Instant::now();

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = bytes.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes.to_vec())
    }

    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<()> {
        let location = object_location(storage_key)?;
        let size = data.len() as u64;
        let start = Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload_with_key failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload_with_key successful"
        );

        Ok(())
    }

    async fn begin_upload(&self, storage_key: &str) -> StorageResult<Box<dyn ObjectUpload>> {
        let location = object_location(storage_key)?;

        let upload = self.store.put_multipart(&location).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                "S3 multipart upload could not be started"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        Ok(Box::new(S3Upload {
            writer: WriteMultipart::new_with_chunk_size(upload, MULTIPART_CHUNK_SIZE),
            bucket: self.bucket.clone(),
            key: storage_key.to_string(),
            bytes_written: 0,
            started: Instant::now(),
        }))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let location = object_location(storage_key)?;
        let start = Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = object_location(storage_key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let location = object_location(storage_key)?;
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "S3 presigning failed"
                );
                StorageError::SigningFailed(e.to_string())
            })?
            .to_string();

        Ok(url)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

/// Multipart upload session. Parts are uploaded in the background as
/// chunks fill up; the object appears when the upload is completed.
struct S3Upload {
    writer: WriteMultipart,
    bucket: String,
    key: String,
    bytes_written: u64,
    started: Instant,
}

#[async_trait]
impl ObjectUpload for S3Upload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.writer
            .wait_for_capacity(MULTIPART_MAX_CONCURRENCY)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        self.bytes_written += data.len() as u64;
        self.writer.put(data);
        Ok(())
    }

    async fn complete(self: Box<Self>) -> StorageResult<u64> {
        let S3Upload {
            writer,
            bucket,
            key,
            bytes_written,
            started,
        } = *self;

        writer.finish().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = bytes_written,
                duration_ms = started.elapsed().as_secs_f64() * 1000.0,
                "S3 multipart upload failed to complete"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = bytes_written,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload successful"
        );

        Ok(bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        let S3Upload {
            writer, bucket, key, ..
        } = *self;

        writer.abort().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                "S3 multipart upload abort failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::warn!(bucket = %bucket, key = %key, "S3 multipart upload aborted");
        Ok(())
    }
}
