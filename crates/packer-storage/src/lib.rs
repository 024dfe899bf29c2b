//! Packer Storage Library
//!
//! This crate provides the bucket-level storage abstraction used by the
//! packer and its implementations for S3 and the local filesystem.
//!
//! # Buckets and keys
//!
//! One `Storage` value serves exactly one bucket; `StorageProvider` opens a
//! bucket by name. Keys are `/`-separated object keys as they appear in S3.
//! Keys must not contain `..` segments or a leading `/`.
//!
//! # Uploads
//!
//! Large objects are written through `Storage::begin_upload`. Nothing is
//! visible at the destination key until the session completes, and an
//! aborted session leaves nothing behind.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, ConfiguredStorageProvider};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use packer_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectUpload, Storage, StorageError, StorageProvider, StorageResult};
