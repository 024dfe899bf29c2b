//! Packer Services Library
//!
//! Archive building, link issuance, orchestration of one bundle run and the
//! invocation handler that turns a raw event into an outcome message.

pub mod archive;
pub mod handler;
pub mod link;
pub mod orchestrator;

pub use archive::{ArchiveBuilder, ArchiveSummary, TarGzArchiveBuilder};
pub use handler::{HandlerError, PackerHandler};
pub use link::issue_link;
pub use orchestrator::{BundleOrchestrator, CompletedBundle};
