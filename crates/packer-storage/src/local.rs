use crate::keys::{validate_key, validate_prefix};
use crate::traits::{ObjectUpload, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Directory below the base path holding in-progress uploads. Bucket names
/// cannot start with `.`, so it never collides with a bucket.
const STAGING_DIR: &str = ".packer-uploads";

/// Local filesystem storage implementation
///
/// Each bucket is a directory below the configured base path and each key a
/// file path relative to it.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    staging: PathBuf,
    bucket: String,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Directory holding one subdirectory per bucket (e.g., "/var/lib/tre/buckets")
    /// * `bucket` - Bucket name, used as the subdirectory name
    /// * `base_url` - Base URL for generated links (e.g., "http://localhost:9000")
    pub async fn new(
        base_path: impl Into<PathBuf>,
        bucket: &str,
        base_url: String,
    ) -> StorageResult<Self> {
        if validate_key(bucket).is_err() || bucket.contains('/') || bucket.starts_with('.')
        {
            return Err(StorageError::ConfigError(format!(
                "Invalid bucket name: {}",
                bucket
            )));
        }

        let base_path = base_path.into();
        let root = base_path.join(bucket);
        let staging = base_path.join(STAGING_DIR);

        for dir in [&root, &staging] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage {
            root,
            staging,
            bucket: bucket.to_string(),
            base_url,
        })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that could escape the bucket directory, including through
    /// symlinks that already exist.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;

        let path = self.root.join(storage_key);

        if let Ok(canonical) = path.canonicalize() {
            let root_canonical = self.root.canonicalize().map_err(|e| {
                StorageError::ConfigError(format!("Failed to canonicalize bucket path: {}", e))
            })?;
            if canonical.strip_prefix(&root_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Convert a file below the bucket root back into its key.
    fn path_to_key(&self, path: &Path) -> StorageResult<String> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            StorageError::ListFailed(format!("{} is outside the bucket", path.display()))
        })?;
        let segments = relative
            .iter()
            .map(|segment| {
                segment.to_str().ok_or_else(|| {
                    StorageError::ListFailed(format!(
                        "File name is not valid UTF-8: {}",
                        path.display()
                    ))
                })
            })
            .collect::<StorageResult<Vec<&str>>>()?;
        Ok(segments.join("/"))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        validate_prefix(prefix)?;
        let start = Instant::now();
        let trimmed = prefix.trim_end_matches('/');
        let start_dir = if trimmed.is_empty() {
            self.root.clone()
        } else {
            self.root.join(trimmed)
        };

        let mut keys = Vec::new();
        let mut pending = Vec::new();

        // Like S3, a prefix only matches keys below it, never an object
        // named exactly like the prefix.
        match fs::metadata(&start_dir).await {
            Ok(meta) if meta.is_dir() => pending.push(start_dir),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::ListFailed(format!(
                    "Failed to read {}: {}",
                    start_dir.display(),
                    e
                )))
            }
        }

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StorageError::ListFailed(format!(
                        "Failed to read directory {}: {}",
                        dir.display(),
                        e
                    )))
                }
            };

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::ListFailed(format!("Failed to read directory entry: {}", e))
            })? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else {
                    keys.push(self.path_to_key(&path)?);
                }
            }
        }

        // Match S3, which lists in lexicographic key order.
        keys.sort();

        tracing::info!(
            bucket = %self.bucket,
            prefix = %prefix,
            object_count = keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage list successful"
        );

        Ok(keys)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;
        let start = Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(data)
    }

    async fn upload_with_key(&self, storage_key: &str, data: Vec<u8>) -> StorageResult<()> {
        let mut upload = self.begin_upload(storage_key).await?;
        if let Err(e) = upload.write(Bytes::from(data)).await {
            let _ = upload.abort().await;
            return Err(e);
        }
        upload.complete().await?;
        Ok(())
    }

    async fn begin_upload(&self, storage_key: &str) -> StorageResult<Box<dyn ObjectUpload>> {
        let path = self.key_to_path(storage_key)?;
        self.ensure_parent_dir(&path).await?;

        let temp_path = self.staging.join(Uuid::new_v4().to_string());

        let file = fs::File::create(&temp_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        Ok(Box::new(LocalUpload {
            file,
            temp_path,
            final_path: path,
            key: storage_key.to_string(),
            bytes_written: 0,
            started: Instant::now(),
        }))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Local links are not signed; the expiry is carried as a query
    /// parameter for whatever serves the directory.
    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.key_to_path(storage_key)?;

        let expires_in = chrono::Duration::from_std(expires_in)
            .map_err(|e| StorageError::SigningFailed(e.to_string()))?;
        let expires_at = chrono::Utc::now()
            .checked_add_signed(expires_in)
            .ok_or_else(|| StorageError::SigningFailed("Expiry out of range".to_string()))?;

        let encoded_key = storage_key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Ok(format!(
            "{}/{}/{}?expires={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.bucket),
            encoded_key,
            expires_at.timestamp()
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Upload into a file in the staging directory, renamed into place on
/// completion.
struct LocalUpload {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    key: String,
    bytes_written: u64,
    started: Instant,
}

#[async_trait]
impl ObjectUpload for LocalUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                self.temp_path.display(),
                e
            ))
        })?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn complete(self: Box<Self>) -> StorageResult<u64> {
        let LocalUpload {
            mut file,
            temp_path,
            final_path,
            key,
            bytes_written,
            started,
        } = *self;

        let finished = async {
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &final_path).await
        }
        .await;

        if let Err(e) = finished {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::UploadFailed(format!(
                "Failed to finalize file {}: {}",
                final_path.display(),
                e
            )));
        }

        tracing::info!(
            path = %final_path.display(),
            key = %key,
            size_bytes = bytes_written,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        let LocalUpload {
            file,
            temp_path,
            key,
            ..
        } = *self;
        drop(file);

        match fs::remove_file(&temp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to remove {}: {}",
                    temp_path.display(),
                    e
                )))
            }
        }

        tracing::warn!(key = %key, "Local storage upload aborted");
        Ok(())
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "out", "http://localhost:9000".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_upload_download() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let data = b"test data".to_vec();
        storage
            .upload_with_key("case/123/a.pdf", data.clone())
            .await
            .unwrap();

        let downloaded = storage.download("case/123/a.pdf").await.unwrap();
        assert_eq!(data, downloaded);
        assert!(dir.path().join("out/case/123/a.pdf").exists());
    }

    #[tokio::test]
    async fn test_list_is_recursive_and_scoped_to_prefix() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        for key in [
            "case/123/b.pdf",
            "case/123/a.pdf",
            "case/123/images/1.png",
            "case/1234/other.pdf",
            "unrelated.txt",
        ] {
            storage.upload_with_key(key, b"x".to_vec()).await.unwrap();
        }

        let keys = storage.list("case/123/").await.unwrap();
        assert_eq!(
            keys,
            vec!["case/123/a.pdf", "case/123/b.pdf", "case/123/images/1.png"]
        );

        assert_eq!(storage.list("").await.unwrap().len(), 5);
        assert!(storage.list("missing/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_invisible_until_complete() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let mut upload = storage.begin_upload("ref/E1/ref.tar.gz").await.unwrap();
        upload.write(Bytes::from_static(b"part one ")).await.unwrap();
        upload.write(Bytes::from_static(b"part two")).await.unwrap();

        assert!(!storage.exists("ref/E1/ref.tar.gz").await.unwrap());
        assert!(storage.list("ref/").await.unwrap().is_empty());

        let size = upload.complete().await.unwrap();
        assert_eq!(size, 17);
        assert_eq!(
            storage.download("ref/E1/ref.tar.gz").await.unwrap(),
            b"part one part two".to_vec()
        );
    }

    #[tokio::test]
    async fn test_aborted_upload_leaves_nothing() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let mut upload = storage.begin_upload("ref/E1/ref.tar.gz").await.unwrap();
        upload.write(Bytes::from_static(b"partial")).await.unwrap();
        upload.abort().await.unwrap();

        assert!(!storage.exists("ref/E1/ref.tar.gz").await.unwrap());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("out/ref/E1"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
        let staged: Vec<_> = std::fs::read_dir(dir.path().join(STAGING_DIR))
            .unwrap()
            .collect();
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn test_object_named_like_prefix_is_not_listed() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        storage
            .upload_with_key("case/123", b"x".to_vec())
            .await
            .unwrap();

        assert!(storage.list("case/123").await.unwrap().is_empty());
        assert!(storage.list("case/123/").await.unwrap().is_empty());
        assert_eq!(storage.list("case/").await.unwrap(), vec!["case/123"]);
    }

    #[tokio::test]
    async fn test_dot_files_are_listed() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        storage
            .upload_with_key("case/123/.packer-upload-a.pdf", b"x".to_vec())
            .await
            .unwrap();

        assert_eq!(
            storage.list("case/123/").await.unwrap(),
            vec!["case/123/.packer-upload-a.pdf"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_file_name_fails_listing() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let case_dir = dir.path().join("out/case");
        std::fs::create_dir_all(&case_dir).unwrap();
        std::fs::write(case_dir.join("good.pdf"), b"x").unwrap();
        std::fs::write(case_dir.join(OsStr::from_bytes(b"bad\xff.pdf")), b"x").unwrap();

        let result = storage.list("case/").await;
        assert!(matches!(result, Err(StorageError::ListFailed(_))));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.list("../").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_invalid_bucket_name_rejected() {
        let dir = tempdir().unwrap();
        for bucket in ["../escape", ".packer-uploads", "a/b"] {
            let result = LocalStorage::new(dir.path(), bucket, "http://x".to_string()).await;
            assert!(matches!(result, Err(StorageError::ConfigError(_))));
        }
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.delete("nonexistent/file.txt").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_presigned_url_format() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let url = storage
            .get_presigned_url("case 123.tar.gz", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/out/case%20123.tar.gz?expires="));
        let expires: i64 = url.rsplit('=').next().unwrap().parse().unwrap();
        assert!(expires > chrono::Utc::now().timestamp());
    }
}
