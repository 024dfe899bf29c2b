//! Error types module
//!
//! `BundleFailure` is the classified outcome of a failed bundle run. Every
//! variant maps onto one entry of the failure taxonomy so the message
//! builder can switch on the kind instead of inspecting error strings.
//! `StructuralError` covers input that never reached a store operation.

use crate::config::PackageMode;

/// Log level for failure reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected rejections such as malformed input
    Warn,
    /// Store faults and everything unexpected
    Error,
}

/// A required input field was missing, or the message builder was handed
/// data that cannot produce a fully populated message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("missing or empty required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("package location does not match the {mode} package mode")]
    LocationMismatch { mode: PackageMode },
}

impl StructuralError {
    /// Field paths reported missing, empty for other variants.
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            StructuralError::MissingFields(fields) => fields,
            StructuralError::LocationMismatch { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleFailure {
    #[error("invalid input event: {0}")]
    Structural(#[from] StructuralError),

    #[error("failed to list objects under '{prefix}' in bucket '{bucket}': {message}")]
    Enumeration {
        bucket: String,
        prefix: String,
        message: String,
    },

    #[error("no objects found under '{prefix}' in bucket '{bucket}'")]
    EmptySource { bucket: String, prefix: String },

    #[error("failed to build archive '{key}' in bucket '{bucket}': {message}")]
    Bundling {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to issue link for '{key}' in bucket '{bucket}': {message}")]
    LinkIssuance {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Static metadata per variant: (error_code, recoverable, log_level).
fn failure_static_metadata(failure: &BundleFailure) -> (&'static str, bool, LogLevel) {
    match failure {
        BundleFailure::Structural(_) => ("STRUCTURAL_ERROR", false, LogLevel::Warn),
        BundleFailure::Enumeration { .. } => ("ENUMERATION_ERROR", true, LogLevel::Error),
        BundleFailure::EmptySource { .. } => ("EMPTY_SOURCE", false, LogLevel::Warn),
        BundleFailure::Bundling { .. } => ("BUNDLING_ERROR", true, LogLevel::Error),
        BundleFailure::LinkIssuance { .. } => ("LINK_ISSUANCE_ERROR", true, LogLevel::Error),
    }
}

impl BundleFailure {
    /// Machine-readable failure code, stable across releases.
    pub fn error_code(&self) -> &'static str {
        failure_static_metadata(self).0
    }

    /// Whether re-running the same input could plausibly succeed.
    ///
    /// Nothing in this crate retries; the flag is informational for the
    /// invoking framework and for logs.
    pub fn is_recoverable(&self) -> bool {
        failure_static_metadata(self).1
    }

    pub fn log_level(&self) -> LogLevel {
        failure_static_metadata(self).2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_display_lists_every_field() {
        let err = StructuralError::MissingFields(vec!["parameters.reference", "parameters.status"]);
        assert_eq!(
            err.to_string(),
            "missing or empty required field(s): parameters.reference, parameters.status"
        );
        assert_eq!(err.missing_fields().len(), 2);
    }

    #[test]
    fn test_failure_metadata() {
        let bundling = BundleFailure::Bundling {
            bucket: "out".to_string(),
            key: "ref/E1/ref.tar.gz".to_string(),
            message: "access denied".to_string(),
        };
        assert_eq!(bundling.error_code(), "BUNDLING_ERROR");
        assert!(bundling.is_recoverable());
        assert_eq!(bundling.log_level(), LogLevel::Error);

        let structural: BundleFailure = StructuralError::MissingFields(vec!["x"]).into();
        assert_eq!(structural.error_code(), "STRUCTURAL_ERROR");
        assert!(!structural.is_recoverable());
        assert_eq!(structural.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_failure_display_is_descriptive() {
        let failure = BundleFailure::EmptySource {
            bucket: "src".to_string(),
            prefix: "case/123/".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "no objects found under 'case/123/' in bucket 'src'"
        );
    }
}
