//! In-memory storage for tests
//!
//! `MockStorage` keeps objects in a map and can be told to fail specific
//! operations. Streamed uploads are buffered and only land in the map when
//! the session completes, like the real backends.

use crate::keys::{validate_key, validate_prefix};
use crate::{ObjectUpload, Storage, StorageBackend, StorageError, StorageProvider, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Failures {
    list: bool,
    upload: bool,
    presign: bool,
    downloads: HashSet<String>,
}

/// Mock storage implementation that stores objects in memory
pub struct MockStorage {
    bucket: String,
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    failures: Arc<Mutex<Failures>>,
    aborted_uploads: Arc<Mutex<Vec<String>>>,
}

impl MockStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            files: Arc::new(Mutex::new(BTreeMap::new())),
            failures: Arc::new(Mutex::new(Failures::default())),
            aborted_uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set an object in the mock storage
    pub fn set_file(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), data.into());
    }

    /// Check if an object exists in the mock storage
    pub fn has_file(&self, key: &str) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }

    /// Get object data (for test assertions)
    pub fn get_file(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).cloned()
    }

    /// All keys currently stored, sorted
    pub fn keys(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    /// Keys of upload sessions that were aborted
    pub fn aborted_uploads(&self) -> Vec<String> {
        self.aborted_uploads.lock().unwrap().clone()
    }

    pub fn fail_list(&self) {
        self.failures.lock().unwrap().list = true;
    }

    pub fn fail_download(&self, key: &str) {
        self.failures
            .lock()
            .unwrap()
            .downloads
            .insert(key.to_string());
    }

    /// Make every streamed write and single-request upload fail
    pub fn fail_upload(&self) {
        self.failures.lock().unwrap().upload = true;
    }

    pub fn fail_presign(&self) {
        self.failures.lock().unwrap().presign = true;
    }
}

#[async_trait]
impl Storage for MockStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        validate_prefix(prefix)?;
        if self.failures.lock().unwrap().list {
            return Err(StorageError::ListFailed(format!(
                "injected list failure for {}/{}",
                self.bucket, prefix
            )));
        }

        let trimmed = prefix.trim_end_matches('/');
        let files = self.files.lock().unwrap();
        let keys = files
            .keys()
            .filter(|key| {
                trimmed.is_empty()
                    || key
                        .strip_prefix(trimmed)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .cloned()
            .collect();
        Ok(keys)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        validate_key(storage_key)?;
        if self.failures.lock().unwrap().downloads.contains(storage_key) {
            return Err(StorageError::DownloadFailed(format!(
                "injected download failure for {}",
                storage_key
            )));
        }
        self.files
            .lock()
            .unwrap()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<()> {
        validate_key(storage_key)?;
        if self.failures.lock().unwrap().upload {
            return Err(StorageError::UploadFailed(format!(
                "injected upload failure for {}",
                storage_key
            )));
        }
        self.set_file(storage_key, data);
        Ok(())
    }

    async fn begin_upload(&self, storage_key: &str) -> StorageResult<Box<dyn ObjectUpload>> {
        validate_key(storage_key)?;
        Ok(Box::new(MockUpload {
            key: storage_key.to_string(),
            buffer: Vec::new(),
            files: Arc::clone(&self.files),
            failures: Arc::clone(&self.failures),
            aborted_uploads: Arc::clone(&self.aborted_uploads),
        }))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        self.files.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_key(storage_key)?;
        Ok(self.has_file(storage_key))
    }

    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        if self.failures.lock().unwrap().presign {
            return Err(StorageError::SigningFailed(format!(
                "injected signing failure for {}",
                storage_key
            )));
        }
        Ok(format!(
            "https://{}.example.com/{}?X-Amz-Expires={}",
            self.bucket,
            storage_key,
            expires_in.as_secs()
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

struct MockUpload {
    key: String,
    buffer: Vec<u8>,
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    failures: Arc<Mutex<Failures>>,
    aborted_uploads: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ObjectUpload for MockUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        if self.failures.lock().unwrap().upload {
            return Err(StorageError::UploadFailed(format!(
                "injected upload failure for {}",
                self.key
            )));
        }
        self.buffer.extend_from_slice(&data);
        Ok(())
    }

    async fn complete(self: Box<Self>) -> StorageResult<u64> {
        if self.failures.lock().unwrap().upload {
            return Err(StorageError::UploadFailed(format!(
                "injected upload failure for {}",
                self.key
            )));
        }
        let size = self.buffer.len() as u64;
        self.files.lock().unwrap().insert(self.key, self.buffer);
        Ok(size)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.aborted_uploads.lock().unwrap().push(self.key);
        Ok(())
    }
}

/// Provider that hands out registered `MockStorage` buckets.
#[derive(Default)]
pub struct MockStorageProvider {
    buckets: Mutex<HashMap<String, Arc<MockStorage>>>,
}

impl MockStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a bucket, creating it if needed
    pub fn bucket(&self, name: &str) -> Arc<MockStorage> {
        self.buckets
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MockStorage::new(name)))
            .clone()
    }
}

#[async_trait]
impl StorageProvider for MockStorageProvider {
    async fn open(&self, bucket: &str) -> StorageResult<Arc<dyn Storage>> {
        let storage = self
            .buckets
            .lock()
            .unwrap()
            .get(bucket)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("bucket {}", bucket)))?;
        Ok(storage)
    }
}
