//! Configuration module
//!
//! Configuration is read once at process start and then passed around as an
//! immutable `PackerConfig`. Parsing goes through a key lookup function so the
//! same code serves the process environment and test fixtures.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use crate::storage_types::StorageBackend;

/// Longest lifetime S3 accepts for a SigV4 presigned URL.
const MAX_S3_PRESIGNED_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Which of the two package workflows this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageMode {
    /// Judgment packages: bundle, then publish a presigned link.
    WithLink,
    /// Court document packages: bundle and report the stored location.
    LocationOnly,
}

impl FromStr for PackageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "with-link" | "with_link" => Ok(PackageMode::WithLink),
            "location-only" | "location_only" => Ok(PackageMode::LocationOnly),
            _ => Err(anyhow::anyhow!("Invalid package mode: {}", s)),
        }
    }
}

impl Display for PackageMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PackageMode::WithLink => write!(f, "with-link"),
            PackageMode::LocationOnly => write!(f, "location-only"),
        }
    }
}

/// What to return when the presigned link cannot be issued after a
/// successful bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFailurePolicy {
    /// Report the failure downstream as an Error message.
    Error,
    /// Return no message at all.
    Suppress,
}

impl FromStr for LinkFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LinkFailurePolicy::Error),
            "suppress" => Ok(LinkFailurePolicy::Suppress),
            _ => Err(anyhow::anyhow!("Invalid link failure policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Storage backend settings shared by the source and output buckets.
#[derive(Clone, Debug)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub region: Option<String>,
    pub endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, LocalStack, etc.)
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
}

/// Process configuration.
#[derive(Clone, Debug)]
pub struct PackerConfig {
    pub environment: String,
    pub out_bucket: String,
    /// Reported as `properties.function`
    pub process_name: String,
    /// Reported as `properties.producer`
    pub producer: String,
    pub mode: PackageMode,
    /// Link lifetime, always `Some` in `WithLink` mode.
    pub presigned_url_expiry: Option<Duration>,
    pub link_failure_policy: LinkFailurePolicy,
    pub log_format: LogFormat,
    pub storage: StorageSettings,
}

impl PackerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            optional(name)
                .ok_or_else(|| anyhow::anyhow!("{} must be set to a non-empty value", name))
        };

        let mode = optional("TRE_PACKAGE_MODE")
            .map(|s| s.parse::<PackageMode>())
            .transpose()?
            .unwrap_or(PackageMode::WithLink);

        let presigned_url_expiry = match mode {
            PackageMode::WithLink => {
                let raw = required("TRE_PRESIGNED_URL_EXPIRY")?;
                let secs = raw.parse::<u64>().map_err(|_| {
                    anyhow::anyhow!(
                        "TRE_PRESIGNED_URL_EXPIRY must be a whole number of seconds, got '{}'",
                        raw
                    )
                })?;
                Some(Duration::from_secs(secs))
            }
            PackageMode::LocationOnly => None,
        };

        let out_bucket = match optional("TRE_S3_OUT_BUCKET") {
            Some(bucket) => bucket,
            None => required("TRE_S3_JUDGMENT_OUT_BUCKET").map_err(|_| {
                anyhow::anyhow!("TRE_S3_OUT_BUCKET must be set to a non-empty value")
            })?,
        };

        let storage = StorageSettings {
            backend: optional("STORAGE_BACKEND")
                .map(|s| s.parse::<StorageBackend>())
                .transpose()?
                .unwrap_or(StorageBackend::S3),
            region: optional("S3_REGION").or_else(|| optional("AWS_REGION")),
            endpoint: optional("S3_ENDPOINT"),
            local_storage_path: optional("LOCAL_STORAGE_PATH"),
            local_storage_base_url: optional("LOCAL_STORAGE_BASE_URL"),
        };

        let config = PackerConfig {
            environment: required("TRE_ENVIRONMENT")?,
            out_bucket,
            process_name: required("TRE_PROCESS_NAME")?,
            producer: required("TRE_SYSTEM_NAME")?,
            mode,
            presigned_url_expiry,
            link_failure_policy: optional("TRE_LINK_FAILURE_POLICY")
                .map(|s| s.parse::<LinkFailurePolicy>())
                .transpose()?
                .unwrap_or(LinkFailurePolicy::Error),
            log_format: optional("LOG_FORMAT")
                .map(|s| s.parse::<LogFormat>())
                .transpose()?
                .unwrap_or(LogFormat::Text),
            storage,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.mode == PackageMode::WithLink {
            let expiry = self.presigned_url_expiry.ok_or_else(|| {
                anyhow::anyhow!("TRE_PRESIGNED_URL_EXPIRY must be set in with-link mode")
            })?;
            if expiry.is_zero() {
                return Err(anyhow::anyhow!(
                    "TRE_PRESIGNED_URL_EXPIRY must be greater than zero"
                ));
            }
            if self.storage.backend == StorageBackend::S3
                && expiry.as_secs() > MAX_S3_PRESIGNED_EXPIRY_SECS
            {
                return Err(anyhow::anyhow!(
                    "TRE_PRESIGNED_URL_EXPIRY must not exceed {} seconds for S3",
                    MAX_S3_PRESIGNED_EXPIRY_SECS
                ));
            }
        }

        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.storage.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "prod" | "production")
    }
}
