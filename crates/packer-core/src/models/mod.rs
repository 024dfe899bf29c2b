//! Data models
//!
//! `event` holds the triggering message, `job` the per-invocation bundle
//! plan, and `outcome` the three message shapes returned downstream.

mod event;
mod job;
mod outcome;

// Re-export all models for convenient imports
pub use event::*;
pub use job::*;
pub use outcome::*;

pub(crate) use event::present;
