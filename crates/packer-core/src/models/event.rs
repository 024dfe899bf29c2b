use serde::{Deserialize, Serialize};

use crate::error::StructuralError;

/// Execution identifiers of the triggering message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventProperties {
    pub execution_id: Option<String>,
    pub parent_execution_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventParameters {
    pub s3_bucket: Option<String>,
    pub s3_folder_name: Option<String>,
    pub reference: Option<String>,
    pub originator: Option<String>,
    pub status: Option<String>,
}

/// The triggering message as received.
///
/// Every field is optional at this level so that an incomplete event still
/// deserializes and can be reported; `validate` enforces presence. Unknown
/// fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputEvent {
    #[serde(default)]
    pub properties: EventProperties,
    #[serde(default)]
    pub parameters: EventParameters,
}

/// A fully validated event. Every field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    pub execution_id: String,
    pub parent_execution_id: String,
    pub source_bucket: String,
    pub source_prefix: String,
    pub reference: String,
    pub originator: String,
    pub status: String,
}

/// Returns the value when it holds something other than whitespace.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl InputEvent {
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Check every required field, reporting all missing ones at once.
    ///
    /// Values are carried over verbatim, whitespace included.
    pub fn validate(&self) -> Result<BundleRequest, StructuralError> {
        let mut missing = Vec::new();
        let mut take = |value: &Option<String>, path: &'static str| match present(value) {
            Some(v) => v.to_string(),
            None => {
                missing.push(path);
                String::new()
            }
        };

        let request = BundleRequest {
            execution_id: take(&self.properties.execution_id, "properties.executionId"),
            parent_execution_id: take(
                &self.properties.parent_execution_id,
                "properties.parentExecutionId",
            ),
            source_bucket: take(&self.parameters.s3_bucket, "parameters.s3Bucket"),
            source_prefix: take(&self.parameters.s3_folder_name, "parameters.s3FolderName"),
            reference: take(&self.parameters.reference, "parameters.reference"),
            originator: take(&self.parameters.originator, "parameters.originator"),
            status: take(&self.parameters.status, "parameters.status"),
        };

        if missing.is_empty() {
            Ok(request)
        } else {
            Err(StructuralError::MissingFields(missing))
        }
    }
}
