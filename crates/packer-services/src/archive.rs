//! Streaming tar.gz archive construction
//!
//! Members are downloaded one at a time and appended to a tar stream that is
//! gzip-compressed into an in-memory buffer. The buffer is drained into the
//! destination upload session whenever it grows past the flush threshold, so
//! memory use is bounded by one source object plus one chunk.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use packer_storage::{ObjectUpload, Storage};

/// Compressed bytes buffered before they are handed to the upload.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 8 * 1024 * 1024;

/// Totals for one finished archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveSummary {
    pub member_count: usize,
    pub uncompressed_bytes: u64,
    pub compressed_bytes: u64,
}

/// Builds one archive object from a list of source objects.
#[async_trait]
pub trait ArchiveBuilder: Send + Sync {
    /// Bundle `object_keys` from `source` into `destination_key`.
    ///
    /// Either the complete archive is stored at `destination_key` or nothing
    /// is.
    async fn bundle(
        &self,
        source: &dyn Storage,
        object_keys: &[String],
        destination: &dyn Storage,
        destination_key: &str,
    ) -> Result<ArchiveSummary>;
}

/// gzip-compressed tar, one member per source object named by its key.
#[derive(Debug, Clone)]
pub struct TarGzArchiveBuilder {
    flush_threshold: usize,
    compression: Compression,
}

impl TarGzArchiveBuilder {
    pub fn new() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            compression: Compression::default(),
        }
    }

    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold.max(1);
        self
    }

    async fn write_members(
        &self,
        source: &dyn Storage,
        object_keys: &[String],
        upload: &mut dyn ObjectUpload,
    ) -> Result<ArchiveSummary> {
        let encoder = GzEncoder::new(Vec::with_capacity(self.flush_threshold), self.compression);
        let mut tar = tar::Builder::new(encoder);
        let mut summary = ArchiveSummary::default();

        for key in object_keys {
            let data = source
                .download(key)
                .await
                .with_context(|| format!("Failed to read source object: {}", key))?;

            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            header.set_cksum();

            tar.append_data(&mut header, key, data.as_slice())
                .with_context(|| format!("Failed to add file to TAR: {}", key))?;

            summary.member_count += 1;
            summary.uncompressed_bytes += data.len() as u64;

            let buffered = tar.get_mut().get_mut();
            if buffered.len() >= self.flush_threshold {
                let chunk = std::mem::take(buffered);
                summary.compressed_bytes += flush(upload, chunk).await?;
            }
        }

        let encoder = tar.into_inner().context("Failed to finalize TAR archive")?;
        let remainder = encoder.finish().context("Failed to finalize gzip stream")?;
        summary.compressed_bytes += flush(upload, remainder).await?;

        Ok(summary)
    }
}

impl Default for TarGzArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn flush(upload: &mut dyn ObjectUpload, chunk: Vec<u8>) -> Result<u64> {
    if chunk.is_empty() {
        return Ok(0);
    }
    let size = chunk.len() as u64;
    upload
        .write(Bytes::from(chunk))
        .await
        .context("Failed to write archive data")?;
    Ok(size)
}

#[async_trait]
impl ArchiveBuilder for TarGzArchiveBuilder {
    async fn bundle(
        &self,
        source: &dyn Storage,
        object_keys: &[String],
        destination: &dyn Storage,
        destination_key: &str,
    ) -> Result<ArchiveSummary> {
        let mut upload = destination
            .begin_upload(destination_key)
            .await
            .with_context(|| format!("Failed to start upload: {}", destination_key))?;

        let summary = match self
            .write_members(source, object_keys, upload.as_mut())
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                if let Err(abort_err) = upload.abort().await {
                    tracing::warn!(
                        error = %abort_err,
                        bucket = %destination.bucket(),
                        key = %destination_key,
                        "Failed to abort archive upload"
                    );
                }
                return Err(e);
            }
        };

        upload
            .complete()
            .await
            .with_context(|| format!("Failed to store archive: {}", destination_key))?;

        tracing::debug!(
            bucket = %destination.bucket(),
            key = %destination_key,
            member_count = summary.member_count,
            uncompressed_bytes = summary.uncompressed_bytes,
            compressed_bytes = summary.compressed_bytes,
            "Archive written"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use packer_storage::test_helpers::MockStorage;
    use std::io::Read;

    fn read_members(archive: &[u8]) -> Vec<(String, Vec<u8>, u32)> {
        let mut archive = tar::Archive::new(GzDecoder::new(archive));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().to_string_lossy().into_owned();
                let mode = entry.header().mode().unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (path, data, mode)
            })
            .collect()
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_members_keep_keys_and_order() {
        let source = MockStorage::new("src");
        let output = MockStorage::new("out");
        source.set_file("case/123/b.pdf", b"second".to_vec());
        source.set_file("case/123/a.pdf", b"first".to_vec());

        let summary = TarGzArchiveBuilder::new()
            .bundle(
                &source,
                &keys(&["case/123/b.pdf", "case/123/a.pdf"]),
                &output,
                "case123/E1/case123.tar.gz",
            )
            .await
            .unwrap();

        let archive = output.get_file("case123/E1/case123.tar.gz").unwrap();
        let members = read_members(&archive);
        assert_eq!(
            members,
            vec![
                ("case/123/b.pdf".to_string(), b"second".to_vec(), 0o644),
                ("case/123/a.pdf".to_string(), b"first".to_vec(), 0o644),
            ]
        );
        assert_eq!(summary.member_count, 2);
        assert_eq!(summary.uncompressed_bytes, 11);
        assert_eq!(summary.compressed_bytes, archive.len() as u64);
    }

    #[tokio::test]
    async fn test_small_threshold_streams_in_chunks() {
        let source = MockStorage::new("src");
        let output = MockStorage::new("out");
        let names: Vec<String> = (0..20).map(|i| format!("docs/{:02}.xml", i)).collect();
        for (i, name) in names.iter().enumerate() {
            source.set_file(name, vec![i as u8; 4096]);
        }

        let summary = TarGzArchiveBuilder::new()
            .with_flush_threshold(64)
            .bundle(&source, &names, &output, "ref/E1/ref.tar.gz")
            .await
            .unwrap();

        let archive = output.get_file("ref/E1/ref.tar.gz").unwrap();
        let members = read_members(&archive);
        assert_eq!(members.len(), 20);
        assert_eq!(members[7].1, vec![7u8; 4096]);
        assert_eq!(summary.compressed_bytes, archive.len() as u64);
    }

    #[tokio::test]
    async fn test_unreadable_member_aborts_upload() {
        let source = MockStorage::new("src");
        let output = MockStorage::new("out");
        source.set_file("case/a.pdf", b"a".to_vec());
        source.set_file("case/b.pdf", b"b".to_vec());
        source.fail_download("case/b.pdf");

        let err = TarGzArchiveBuilder::new()
            .with_flush_threshold(1)
            .bundle(
                &source,
                &keys(&["case/a.pdf", "case/b.pdf"]),
                &output,
                "ref/E1/ref.tar.gz",
            )
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("case/b.pdf"));
        assert!(!output.has_file("ref/E1/ref.tar.gz"));
        assert_eq!(output.aborted_uploads(), vec!["ref/E1/ref.tar.gz"]);
    }

    #[tokio::test]
    async fn test_write_failure_leaves_nothing() {
        let source = MockStorage::new("src");
        let output = MockStorage::new("out");
        source.set_file("case/a.pdf", b"a".to_vec());
        output.fail_upload();

        let result = TarGzArchiveBuilder::new()
            .bundle(&source, &keys(&["case/a.pdf"]), &output, "ref/E1/ref.tar.gz")
            .await;

        assert!(result.is_err());
        assert!(output.keys().is_empty());
        assert_eq!(output.aborted_uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_member_list_is_a_valid_archive() {
        let source = MockStorage::new("src");
        let output = MockStorage::new("out");

        let summary = TarGzArchiveBuilder::new()
            .bundle(&source, &[], &output, "ref/E1/ref.tar.gz")
            .await
            .unwrap();

        assert_eq!(summary.member_count, 0);
        assert!(read_members(&output.get_file("ref/E1/ref.tar.gz").unwrap()).is_empty());
    }
}
