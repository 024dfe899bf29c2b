//! Outcome message construction
//!
//! Pure mapping from a validated request (or the raw event plus a failure)
//! to one of the three outcome message shapes. The message type literal and
//! parameter shape depend only on the package mode and on success versus
//! failure. A message is either fully populated or not built at all.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::{PackageMode, PackerConfig};
use crate::constants::{
    MESSAGE_TYPE_COURT_DOCUMENT_PACKAGE_AVAILABLE, MESSAGE_TYPE_ERROR,
    MESSAGE_TYPE_JUDGMENT_PACKAGE_AVAILABLE, METADATA_FILE_PATH, METADATA_FILE_TYPE,
};
use crate::error::{BundleFailure, StructuralError};
use crate::models::{
    present, BundleRequest, ErrorParameters, InputEvent, MessageProperties, OutcomeMessage,
    OutcomeParameters, PackageAvailableParameters, PackageLocation, PackageStoredParameters,
};

/// ISO-8601 UTC timestamp with microseconds and a `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Collect the paths of blank values, failing if there are any.
fn require(fields: &[(&str, &'static str)]) -> Result<(), StructuralError> {
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(value, _)| value.trim().is_empty())
        .map(|(_, path)| *path)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StructuralError::MissingFields(missing))
    }
}

#[derive(Debug, Clone)]
pub struct MessageBuilder {
    function: String,
    producer: String,
    mode: PackageMode,
}

impl MessageBuilder {
    pub fn new(function: impl Into<String>, producer: impl Into<String>, mode: PackageMode) -> Self {
        Self {
            function: function.into(),
            producer: producer.into(),
            mode,
        }
    }

    pub fn from_config(config: &PackerConfig) -> Self {
        Self::new(&config.process_name, &config.producer, config.mode)
    }

    pub fn mode(&self) -> PackageMode {
        self.mode
    }

    /// Success message for a finished package, stamped now.
    pub fn success(
        &self,
        request: &BundleRequest,
        location: &PackageLocation,
    ) -> Result<OutcomeMessage, StructuralError> {
        self.success_at(request, location, Utc::now())
    }

    pub fn success_at(
        &self,
        request: &BundleRequest,
        location: &PackageLocation,
        at: DateTime<Utc>,
    ) -> Result<OutcomeMessage, StructuralError> {
        require(&[
            (request.execution_id.as_str(), "properties.executionId"),
            (request.parent_execution_id.as_str(), "properties.parentExecutionId"),
            (request.reference.as_str(), "parameters.reference"),
            (request.originator.as_str(), "parameters.originator"),
            (request.status.as_str(), "parameters.status"),
        ])?;

        let (message_type, parameters) = match (self.mode, location) {
            (PackageMode::WithLink, PackageLocation::Link { url }) => (
                MESSAGE_TYPE_JUDGMENT_PACKAGE_AVAILABLE,
                OutcomeParameters::PackageAvailable(PackageAvailableParameters {
                    status: request.status.clone(),
                    reference: request.reference.clone(),
                    originator: request.originator.clone(),
                    bundle_file_uri: url.clone(),
                    metadata_file_path: METADATA_FILE_PATH.to_string(),
                    metadata_file_type: METADATA_FILE_TYPE.to_string(),
                }),
            ),
            (PackageMode::LocationOnly, PackageLocation::Stored { bucket, key }) => (
                MESSAGE_TYPE_COURT_DOCUMENT_PACKAGE_AVAILABLE,
                OutcomeParameters::PackageStored(PackageStoredParameters {
                    status: request.status.clone(),
                    reference: request.reference.clone(),
                    originator: request.originator.clone(),
                    s3_bucket: bucket.clone(),
                    s3_key: key.clone(),
                    metadata_file_path: METADATA_FILE_PATH.to_string(),
                    metadata_file_type: METADATA_FILE_TYPE.to_string(),
                }),
            ),
            (mode, _) => return Err(StructuralError::LocationMismatch { mode }),
        };

        Ok(OutcomeMessage {
            properties: self.properties(
                message_type,
                &request.execution_id,
                &request.parent_execution_id,
                at,
            ),
            parameters,
        })
    }

    /// Error message for a failed run, built from the raw event so that
    /// structural failures can be reported too.
    pub fn error(
        &self,
        event: &InputEvent,
        failure: &BundleFailure,
    ) -> Result<OutcomeMessage, StructuralError> {
        self.error_at(event, failure, Utc::now())
    }

    pub fn error_at(
        &self,
        event: &InputEvent,
        failure: &BundleFailure,
        at: DateTime<Utc>,
    ) -> Result<OutcomeMessage, StructuralError> {
        let execution_id = present(&event.properties.execution_id);
        let parent_execution_id = present(&event.properties.parent_execution_id);
        let reference = present(&event.parameters.reference);
        let originator = present(&event.parameters.originator);

        let (Some(execution_id), Some(parent_execution_id), Some(reference), Some(originator)) =
            (execution_id, parent_execution_id, reference, originator)
        else {
            let missing = [
                (execution_id, "properties.executionId"),
                (parent_execution_id, "properties.parentExecutionId"),
                (reference, "parameters.reference"),
                (originator, "parameters.originator"),
            ]
            .into_iter()
            .filter(|(value, _)| value.is_none())
            .map(|(_, path)| path)
            .collect();
            return Err(StructuralError::MissingFields(missing));
        };

        Ok(OutcomeMessage {
            properties: self.properties(MESSAGE_TYPE_ERROR, execution_id, parent_execution_id, at),
            parameters: OutcomeParameters::Error(ErrorParameters {
                reference: reference.to_string(),
                originator: originator.to_string(),
                errors: failure.to_string(),
            }),
        })
    }

    fn properties(
        &self,
        message_type: &str,
        execution_id: &str,
        parent_execution_id: &str,
        at: DateTime<Utc>,
    ) -> MessageProperties {
        MessageProperties {
            message_type: message_type.to_string(),
            timestamp: format_timestamp(at),
            function: self.function.clone(),
            producer: self.producer.clone(),
            execution_id: execution_id.to_string(),
            parent_execution_id: parent_execution_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn request() -> BundleRequest {
        BundleRequest {
            execution_id: "E1".to_string(),
            parent_execution_id: "P1".to_string(),
            source_bucket: "src".to_string(),
            source_prefix: "case/123/".to_string(),
            reference: "case123".to_string(),
            originator: "orig".to_string(),
            status: "ok".to_string(),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap()
    }

    fn event() -> InputEvent {
        InputEvent::from_json(json!({
            "properties": {"executionId": "E1", "parentExecutionId": "P1"},
            "parameters": {"reference": "case123", "originator": "orig"}
        }))
        .unwrap()
    }

    #[test]
    fn test_with_link_success_shape() {
        let builder = MessageBuilder::new("tre-judgment-packer", "TRE", PackageMode::WithLink);
        let location = PackageLocation::Link {
            url: "https://out.s3.amazonaws.com/case123.tar.gz?X-Amz-Expires=60".to_string(),
        };
        let message = builder
            .success_at(&request(), &location, fixed_time())
            .unwrap();

        assert_eq!(
            message.to_json().unwrap(),
            json!({
                "properties": {
                    "messageType": "uk.gov.nationalarchives.tre.messages.judgmentpackage.available.JudgmentPackageAvailable",
                    "timestamp": "2026-10-19T09:30:00.000000Z",
                    "function": "tre-judgment-packer",
                    "producer": "TRE",
                    "executionId": "E1",
                    "parentExecutionId": "P1"
                },
                "parameters": {
                    "status": "ok",
                    "reference": "case123",
                    "originator": "orig",
                    "bundleFileURI": "https://out.s3.amazonaws.com/case123.tar.gz?X-Amz-Expires=60",
                    "metadataFilePath": "/metadata.json",
                    "metadataFileType": "Json"
                }
            })
        );
        assert!(!message.is_error());
    }

    #[test]
    fn test_location_only_success_shape() {
        let builder = MessageBuilder::new("tre-court-document-pack", "TRE", PackageMode::LocationOnly);
        let location = PackageLocation::Stored {
            bucket: "out".to_string(),
            key: "case123/E1/case123.tar.gz".to_string(),
        };
        let message = builder
            .success_at(&request(), &location, fixed_time())
            .unwrap();
        let value = message.to_json().unwrap();

        assert!(message
            .message_type()
            .ends_with("CourtDocumentPackageAvailable"));
        assert_eq!(value["parameters"]["s3Bucket"], "out");
        assert_eq!(value["parameters"]["s3Key"], "case123/E1/case123.tar.gz");
        assert_eq!(value["parameters"]["status"], "ok");
        assert!(value["parameters"].get("bundleFileURI").is_none());
    }

    #[test]
    fn test_mismatched_location_is_rejected() {
        let builder = MessageBuilder::new("f", "p", PackageMode::LocationOnly);
        let location = PackageLocation::Link {
            url: "https://example.com/x".to_string(),
        };
        let err = builder.success(&request(), &location).unwrap_err();
        assert_eq!(
            err,
            StructuralError::LocationMismatch {
                mode: PackageMode::LocationOnly
            }
        );
    }

    #[test]
    fn test_success_refuses_blank_propagation_fields() {
        let builder = MessageBuilder::new("f", "p", PackageMode::WithLink);
        let mut blank = request();
        blank.originator = String::new();
        let location = PackageLocation::Link {
            url: "https://example.com/x".to_string(),
        };
        let err = builder.success(&blank, &location).unwrap_err();
        assert_eq!(err.missing_fields(), &["parameters.originator"]);
    }

    #[test]
    fn test_error_shape_omits_status_and_location() {
        let builder = MessageBuilder::new("f", "p", PackageMode::WithLink);
        let failure = BundleFailure::Bundling {
            bucket: "out".to_string(),
            key: "case123/E1/case123.tar.gz".to_string(),
            message: "access denied".to_string(),
        };
        let message = builder.error_at(&event(), &failure, fixed_time()).unwrap();
        let value = message.to_json().unwrap();

        assert!(message.is_error());
        assert_eq!(
            value["properties"]["messageType"],
            "uk.gov.nationalarchives.tre.messages.Error"
        );
        assert_eq!(value["properties"]["executionId"], "E1");
        assert_eq!(value["properties"]["parentExecutionId"], "P1");
        assert_eq!(
            value["parameters"],
            json!({
                "reference": "case123",
                "originator": "orig",
                "errors": "failed to build archive 'case123/E1/case123.tar.gz' in bucket 'out': access denied"
            })
        );
    }

    #[test]
    fn test_error_without_reference_is_structural() {
        let builder = MessageBuilder::new("f", "p", PackageMode::WithLink);
        let mut event = event();
        event.parameters.reference = None;
        let failure = BundleFailure::EmptySource {
            bucket: "src".to_string(),
            prefix: "case/123/".to_string(),
        };
        let err = builder.error(&event, &failure).unwrap_err();
        assert_eq!(err.missing_fields(), &["parameters.reference"]);
    }

    #[test]
    fn test_timestamp_is_fresh_utc() {
        let builder = MessageBuilder::new("f", "p", PackageMode::WithLink);
        let before = Utc::now();
        let message = builder
            .success(
                &request(),
                &PackageLocation::Link {
                    url: "https://example.com/x".to_string(),
                },
            )
            .unwrap();
        let stamped = DateTime::parse_from_rfc3339(&message.properties.timestamp)
            .unwrap()
            .with_timezone(&Utc);

        assert!(message.properties.timestamp.ends_with('Z'));
        assert!(stamped >= before - chrono::Duration::milliseconds(1));
        assert!(stamped <= Utc::now());
    }
}
