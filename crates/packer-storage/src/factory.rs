#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageProvider, StorageResult};
use async_trait::async_trait;
use packer_core::StorageSettings;
use std::sync::Arc;

/// Create a storage backend for one bucket based on configuration
pub async fn create_storage(
    settings: &StorageSettings,
    bucket: &str,
) -> StorageResult<Arc<dyn Storage>> {
    if bucket.trim().is_empty() {
        return Err(StorageError::ConfigError("Bucket name is empty".to_string()));
    }

    match settings.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let region = settings.region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;

            let storage = S3Storage::new(bucket.to_string(), region, settings.endpoint.clone())?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = settings.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = settings.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path, bucket, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => Err(StorageError::ConfigError(
            "In-memory storage cannot be created from configuration".to_string(),
        )),
    }
}

/// `StorageProvider` backed by the process configuration.
#[derive(Clone, Debug)]
pub struct ConfiguredStorageProvider {
    settings: StorageSettings,
}

impl ConfiguredStorageProvider {
    pub fn new(settings: StorageSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl StorageProvider for ConfiguredStorageProvider {
    async fn open(&self, bucket: &str) -> StorageResult<Arc<dyn Storage>> {
        create_storage(&self.settings, bucket).await
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn local_settings(path: &std::path::Path) -> StorageSettings {
        StorageSettings {
            backend: StorageBackend::Local,
            region: None,
            endpoint: None,
            local_storage_path: Some(path.display().to_string()),
            local_storage_base_url: Some("http://localhost:9000".to_string()),
        }
    }

    #[tokio::test]
    async fn test_provider_opens_one_directory_per_bucket() {
        let dir = tempdir().unwrap();
        let provider = ConfiguredStorageProvider::new(local_settings(dir.path()));

        let source = provider.open("src").await.unwrap();
        let output = provider.open("out").await.unwrap();

        assert_eq!(source.bucket(), "src");
        assert_eq!(output.bucket(), "out");
        assert_eq!(source.backend_type(), StorageBackend::Local);
        assert!(dir.path().join("src").is_dir());
        assert!(dir.path().join("out").is_dir());
    }

    #[tokio::test]
    async fn test_missing_settings_are_config_errors() {
        let dir = tempdir().unwrap();
        let mut settings = local_settings(dir.path());
        settings.local_storage_base_url = None;

        let result = create_storage(&settings, "out").await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));

        let result = create_storage(&local_settings(dir.path()), " ").await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
