//! Packer Core Library
//!
//! This crate provides the domain model, failure taxonomy, configuration and
//! outcome message construction shared by every packer component. Nothing in
//! here performs I/O apart from `PackerConfig::from_env`.

pub mod config;
pub mod constants;
pub mod error;
pub mod message;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{LinkFailurePolicy, LogFormat, PackageMode, PackerConfig, StorageSettings};
pub use error::{BundleFailure, LogLevel, StructuralError};
pub use message::MessageBuilder;
pub use models::{
    BundleJob, BundleRequest, InputEvent, OutcomeMessage, OutcomeParameters, PackageLocation,
};
pub use storage_types::StorageBackend;
