//! Bundle orchestration
//!
//! One control flow for both package modes: enumerate the source prefix,
//! build the archive in the output bucket, then either mint a link or report
//! the stored location. Each step classifies its own failure; nothing is
//! retried.

use crate::archive::{ArchiveBuilder, ArchiveSummary};
use crate::link::issue_link;
use packer_core::{
    BundleFailure, BundleJob, BundleRequest, PackageLocation, PackageMode, PackerConfig,
};
use packer_storage::{Storage, StorageProvider, StorageResult};
use std::sync::Arc;
use std::time::Instant;

/// A package that was written and, in link mode, signed.
#[derive(Debug, Clone)]
pub struct CompletedBundle {
    pub job: BundleJob,
    pub location: PackageLocation,
    pub summary: ArchiveSummary,
}

pub struct BundleOrchestrator {
    config: Arc<PackerConfig>,
    storage: Arc<dyn StorageProvider>,
    archive: Arc<dyn ArchiveBuilder>,
    output: Arc<dyn Storage>,
}

impl BundleOrchestrator {
    /// Opens the configured output bucket up front; source buckets are
    /// opened per request.
    pub async fn new(
        config: Arc<PackerConfig>,
        storage: Arc<dyn StorageProvider>,
        archive: Arc<dyn ArchiveBuilder>,
    ) -> StorageResult<Self> {
        let output = storage.open(&config.out_bucket).await?;
        Ok(Self {
            config,
            storage,
            archive,
            output,
        })
    }

    pub fn mode(&self) -> PackageMode {
        self.config.mode
    }

    pub async fn run(&self, request: &BundleRequest) -> Result<CompletedBundle, BundleFailure> {
        let start = Instant::now();
        let job = BundleJob::plan(request, self.output.bucket());

        let (source, source_objects) = self.enumerate(&job).await?;
        if source_objects.is_empty() {
            return Err(BundleFailure::EmptySource {
                bucket: job.source_bucket.clone(),
                prefix: job.source_prefix.clone(),
            });
        }
        let job = job.with_source_objects(source_objects);

        let summary = self
            .archive
            .bundle(
                source.as_ref(),
                &job.source_objects,
                self.output.as_ref(),
                &job.archive_key,
            )
            .await
            .map_err(|e| BundleFailure::Bundling {
                bucket: job.destination_bucket.clone(),
                key: job.archive_key.clone(),
                message: format!("{:#}", e),
            })?;

        tracing::info!(
            reference = %job.reference,
            execution_id = %job.execution_id,
            bucket = %job.destination_bucket,
            key = %job.archive_key,
            member_count = summary.member_count,
            compressed_bytes = summary.compressed_bytes,
            "Package written"
        );

        let location = match self.config.mode {
            PackageMode::WithLink => {
                let url = self.issue(&job).await?;
                PackageLocation::Link { url }
            }
            PackageMode::LocationOnly => PackageLocation::Stored {
                bucket: job.destination_bucket.clone(),
                key: job.archive_key.clone(),
            },
        };

        tracing::info!(
            reference = %job.reference,
            execution_id = %job.execution_id,
            mode = %self.config.mode,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Bundle completed"
        );

        Ok(CompletedBundle {
            job,
            location,
            summary,
        })
    }

    async fn enumerate(
        &self,
        job: &BundleJob,
    ) -> Result<(Arc<dyn Storage>, Vec<String>), BundleFailure> {
        let enumeration_failure = |message: String| BundleFailure::Enumeration {
            bucket: job.source_bucket.clone(),
            prefix: job.source_prefix.clone(),
            message,
        };

        let source = self
            .storage
            .open(&job.source_bucket)
            .await
            .map_err(|e| enumeration_failure(e.to_string()))?;
        let objects = source
            .list(&job.source_prefix)
            .await
            .map_err(|e| enumeration_failure(e.to_string()))?;

        tracing::info!(
            reference = %job.reference,
            execution_id = %job.execution_id,
            bucket = %job.source_bucket,
            prefix = %job.source_prefix,
            object_count = objects.len(),
            objects = ?objects,
            "Source objects enumerated"
        );

        Ok((source, objects))
    }

    async fn issue(&self, job: &BundleJob) -> Result<String, BundleFailure> {
        let link_failure = |message: String| BundleFailure::LinkIssuance {
            bucket: job.destination_bucket.clone(),
            key: job.archive_object_name.clone(),
            message,
        };

        let expiry = self
            .config
            .presigned_url_expiry
            .ok_or_else(|| link_failure("presigned URL expiry is not configured".to_string()))?;

        issue_link(self.output.as_ref(), &job.archive_object_name, expiry)
            .await
            .map_err(|e| link_failure(format!("{:#}", e)))
    }
}
