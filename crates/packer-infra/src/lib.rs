//! Packer Infrastructure Library
//!
//! Process-level setup shared by packer entrypoints.

pub mod telemetry;

pub use telemetry::{init_telemetry, shutdown_telemetry};
