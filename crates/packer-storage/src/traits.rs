//! Storage abstraction traits
//!
//! This module defines the `Storage` trait that all storage backends must
//! implement, the `ObjectUpload` session used for streamed writes, and the
//! `StorageProvider` that opens a backend per bucket.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait for a
/// single bucket. The packer only depends on this trait, never on a
/// concrete backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Name of the bucket this storage serves
    fn bucket(&self) -> &str;

    /// List every object key under `prefix`, recursively.
    ///
    /// Order is whatever the backend returns and must not be relied on.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Download an object by its key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Upload data to a specific key in one request.
    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Start a streamed upload to `storage_key`.
    ///
    /// The object only becomes visible once `ObjectUpload::complete`
    /// succeeds.
    async fn begin_upload(&self, storage_key: &str) -> StorageResult<Box<dyn ObjectUpload>>;

    /// Delete an object by its key. Deleting a missing object is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Generate a presigned/temporary URL for direct access (GET)
    ///
    /// The URL grants read access without credentials until it expires.
    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// An in-progress streamed upload.
///
/// Dropping a session without calling `complete` or `abort` may leave
/// backend-side state (for example an S3 multipart upload) to be reclaimed by
/// lifecycle rules; callers should always end it explicitly.
#[async_trait]
pub trait ObjectUpload: Send {
    /// Append bytes to the object.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Make the object visible at its key.
    async fn complete(self: Box<Self>) -> StorageResult<u64>;

    /// Discard everything written so far.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}

/// Opens a `Storage` for a bucket by name.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn open(&self, bucket: &str) -> StorageResult<Arc<dyn Storage>>;
}
