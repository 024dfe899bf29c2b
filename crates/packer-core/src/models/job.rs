use crate::constants::ARCHIVE_EXTENSION;
use crate::models::BundleRequest;

/// Destination key of a package: `{reference}/{execution_id}/{reference}.tar.gz`.
///
/// The execution id keeps concurrent runs for the same reference apart.
pub fn archive_key(reference: &str, execution_id: &str) -> String {
    format!(
        "{}/{}/{}",
        reference,
        execution_id,
        archive_object_name(reference)
    )
}

/// Bare package file name, `{reference}.tar.gz`. This is the name signed for
/// the public link.
pub fn archive_object_name(reference: &str) -> String {
    format!("{}.{}", reference, ARCHIVE_EXTENSION)
}

/// Everything one invocation needs to know about its package. Never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleJob {
    pub reference: String,
    pub execution_id: String,
    pub source_bucket: String,
    pub source_prefix: String,
    /// Keys in the order enumeration returned them.
    pub source_objects: Vec<String>,
    pub destination_bucket: String,
    pub archive_key: String,
    pub archive_object_name: String,
}

impl BundleJob {
    /// Derive naming for a request. Source objects are filled in after
    /// enumeration.
    pub fn plan(request: &BundleRequest, destination_bucket: &str) -> Self {
        Self {
            reference: request.reference.clone(),
            execution_id: request.execution_id.clone(),
            source_bucket: request.source_bucket.clone(),
            source_prefix: request.source_prefix.clone(),
            source_objects: Vec::new(),
            destination_bucket: destination_bucket.to_string(),
            archive_key: archive_key(&request.reference, &request.execution_id),
            archive_object_name: archive_object_name(&request.reference),
        }
    }

    pub fn with_source_objects(mut self, source_objects: Vec<String>) -> Self {
        self.source_objects = source_objects;
        self
    }
}

/// Where a finished package can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLocation {
    /// Presigned, time-limited URL
    Link { url: String },
    /// Raw bucket and key
    Stored { bucket: String, key: String },
}
