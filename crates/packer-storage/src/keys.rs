//! Shared key checks for storage backends.
//!
//! Keys are `/`-separated and relative: no leading `/`, no empty, `.` or
//! `..` segments. All backends validate the same way.

use crate::traits::{StorageError, StorageResult};

pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must be relative: {}",
            storage_key
        )));
    }
    if storage_key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid segments: {}",
            storage_key
        )));
    }
    Ok(())
}

/// Prefixes may be empty (whole bucket) or end with `/`; the segments in
/// between follow key rules.
pub fn validate_prefix(prefix: &str) -> StorageResult<()> {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(());
    }
    validate_key(trimmed)
}
