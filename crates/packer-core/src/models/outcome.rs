use serde::{Deserialize, Serialize};

/// Envelope shared by every outcome message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageProperties {
    pub message_type: String,
    pub timestamp: String,
    pub function: String,
    pub producer: String,
    pub execution_id: String,
    pub parent_execution_id: String,
}

/// Package published with a presigned link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageAvailableParameters {
    pub status: String,
    pub reference: String,
    pub originator: String,
    #[serde(rename = "bundleFileURI")]
    pub bundle_file_uri: String,
    pub metadata_file_path: String,
    pub metadata_file_type: String,
}

/// Package stored, location reported as bucket and key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageStoredParameters {
    pub status: String,
    pub reference: String,
    pub originator: String,
    pub s3_bucket: String,
    pub s3_key: String,
    pub metadata_file_path: String,
    pub metadata_file_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorParameters {
    pub reference: String,
    pub originator: String,
    pub errors: String,
}

/// Parameter shape, chosen by package mode and outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OutcomeParameters {
    PackageAvailable(PackageAvailableParameters),
    PackageStored(PackageStoredParameters),
    Error(ErrorParameters),
}

/// The single value returned by an invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeMessage {
    pub properties: MessageProperties,
    pub parameters: OutcomeParameters,
}

impl OutcomeMessage {
    pub fn is_error(&self) -> bool {
        matches!(self.parameters, OutcomeParameters::Error(_))
    }

    pub fn message_type(&self) -> &str {
        &self.properties.message_type
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
