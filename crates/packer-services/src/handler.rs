//! Invocation handler
//!
//! Turns one raw input event into at most one outcome message. Every failure
//! that can be described downstream becomes an Error message; only input that
//! cannot even carry an Error message is returned as `HandlerError`.

use crate::archive::{ArchiveBuilder, TarGzArchiveBuilder};
use crate::orchestrator::BundleOrchestrator;
use packer_core::{
    BundleFailure, InputEvent, LinkFailurePolicy, LogLevel, MessageBuilder, OutcomeMessage,
    PackerConfig, StructuralError,
};
use packer_storage::{ConfiguredStorageProvider, StorageError, StorageProvider};
use serde_json::Value;
use std::sync::Arc;

/// Failures that leave the invocation without any message to return.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("input event is not a valid document: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    #[error("cannot build an outcome message: {0}")]
    Structural(#[from] StructuralError),

    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

pub struct PackerHandler {
    config: Arc<PackerConfig>,
    orchestrator: BundleOrchestrator,
    messages: MessageBuilder,
}

impl PackerHandler {
    pub async fn new(
        config: Arc<PackerConfig>,
        storage: Arc<dyn StorageProvider>,
        archive: Arc<dyn ArchiveBuilder>,
    ) -> Result<Self, HandlerError> {
        let orchestrator = BundleOrchestrator::new(config.clone(), storage, archive).await?;
        let messages = MessageBuilder::from_config(&config);
        Ok(Self {
            config,
            orchestrator,
            messages,
        })
    }

    /// Wire the configured storage backend and the tar.gz builder.
    pub async fn from_config(config: PackerConfig) -> Result<Self, HandlerError> {
        let storage = Arc::new(ConfiguredStorageProvider::new(config.storage.clone()));
        Self::new(
            Arc::new(config),
            storage,
            Arc::new(TarGzArchiveBuilder::new()),
        )
        .await
    }

    pub async fn handle(&self, event: Value) -> Result<Option<OutcomeMessage>, HandlerError> {
        tracing::info!(event = %event, "Input event received");

        let input = InputEvent::from_json(event)?;
        let outcome = match input.validate() {
            Ok(request) => match self.orchestrator.run(&request).await {
                Ok(done) => Some(self.messages.success(&request, &done.location)?),
                Err(failure) => self.report(&input, failure)?,
            },
            Err(structural) => self.report(&input, BundleFailure::from(structural))?,
        };

        match &outcome {
            Some(message) => tracing::info!(
                message_type = %message.message_type(),
                execution_id = %message.properties.execution_id,
                outcome = ?message,
                "Outcome message built"
            ),
            None => tracing::info!("No outcome message returned"),
        }

        Ok(outcome)
    }

    fn report(
        &self,
        input: &InputEvent,
        failure: BundleFailure,
    ) -> Result<Option<OutcomeMessage>, HandlerError> {
        let reference = input.parameters.reference.as_deref().unwrap_or_default();
        let execution_id = input.properties.execution_id.as_deref().unwrap_or_default();
        match failure.log_level() {
            LogLevel::Warn => tracing::warn!(
                error = %failure,
                error_code = failure.error_code(),
                recoverable = failure.is_recoverable(),
                reference = %reference,
                execution_id = %execution_id,
                "Bundle rejected"
            ),
            LogLevel::Error => tracing::error!(
                error = %failure,
                error_code = failure.error_code(),
                recoverable = failure.is_recoverable(),
                reference = %reference,
                execution_id = %execution_id,
                "Bundle failed"
            ),
        }

        if matches!(failure, BundleFailure::LinkIssuance { .. })
            && self.config.link_failure_policy == LinkFailurePolicy::Suppress
        {
            return Ok(None);
        }

        Ok(Some(self.messages.error(input, &failure)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packer_core::{LogFormat, PackageMode, StorageBackend, StorageSettings};
    use packer_storage::test_helpers::MockStorageProvider;
    use serde_json::json;
    use std::time::Duration;

    async fn handler(provider: Arc<MockStorageProvider>) -> PackerHandler {
        let config = PackerConfig {
            environment: "test".to_string(),
            out_bucket: "out".to_string(),
            process_name: "tre-packer".to_string(),
            producer: "TRE".to_string(),
            mode: PackageMode::WithLink,
            presigned_url_expiry: Some(Duration::from_secs(60)),
            link_failure_policy: LinkFailurePolicy::Error,
            log_format: LogFormat::Text,
            storage: StorageSettings {
                backend: StorageBackend::Memory,
                region: None,
                endpoint: None,
                local_storage_path: None,
                local_storage_base_url: None,
            },
        };
        PackerHandler::new(
            Arc::new(config),
            provider,
            Arc::new(TarGzArchiveBuilder::new()),
        )
        .await
        .unwrap()
    }

    fn provider() -> Arc<MockStorageProvider> {
        let provider = Arc::new(MockStorageProvider::new());
        provider.bucket("out");
        provider
    }

    #[tokio::test]
    async fn test_non_object_event_is_fatal() {
        let handler = handler(provider()).await;
        let err = handler
            .handle(json!({"parameters": "case123"}))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidEvent(_)));
    }

    #[tokio::test]
    async fn test_missing_identifiers_are_fatal() {
        let handler = handler(provider()).await;
        let err = handler
            .handle(json!({"parameters": {"reference": "case123", "originator": "orig"}}))
            .await
            .unwrap_err();
        match err {
            HandlerError::Structural(structural) => assert_eq!(
                structural.missing_fields(),
                &["properties.executionId", "properties.parentExecutionId"]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_source_prefix_is_error_message() {
        let handler = handler(provider()).await;
        let message = handler
            .handle(json!({
                "properties": {"executionId": "E1", "parentExecutionId": "P1"},
                "parameters": {"s3Bucket": "src", "reference": "case123", "originator": "orig", "status": "ok"}
            }))
            .await
            .unwrap()
            .unwrap();

        assert!(message.is_error());
        let value = message.to_json().unwrap();
        assert!(value["parameters"]["errors"]
            .as_str()
            .unwrap()
            .contains("parameters.s3FolderName"));
    }
}
