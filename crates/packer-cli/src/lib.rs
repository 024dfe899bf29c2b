//! Helpers for the `tre-packer` binary: event input and outcome output.

use anyhow::{Context, Result};
use packer_core::OutcomeMessage;
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Read the input event from a file, or from stdin when `path` is `-`.
pub fn read_event(path: &Path) -> Result<Value> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read event from stdin")?;
        raw
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file: {}", path.display()))?
    };

    serde_json::from_str(&raw).context("Event is not valid JSON")
}

/// Render the outcome for stdout; a suppressed outcome prints `null`.
pub fn render_outcome(outcome: Option<&OutcomeMessage>, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(&outcome)
    } else {
        serde_json::to_string(&outcome)
    };
    rendered.context("Serialize outcome")
}
