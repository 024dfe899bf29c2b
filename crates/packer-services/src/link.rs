use anyhow::{Context, Result};
use packer_storage::Storage;
use std::time::Duration;
use url::Url;

/// Mint a time-limited GET link for `object_name` and check that it is an
/// absolute URL.
pub async fn issue_link(
    storage: &dyn Storage,
    object_name: &str,
    expires_in: Duration,
) -> Result<String> {
    let link = storage
        .get_presigned_url(object_name, expires_in)
        .await
        .with_context(|| format!("Failed to presign: {}", object_name))?;

    let parsed = Url::parse(&link).with_context(|| format!("Malformed link: {}", link))?;
    if parsed.cannot_be_a_base() {
        anyhow::bail!("Link is not a hierarchical URL: {}", link);
    }

    Ok(link)
}
