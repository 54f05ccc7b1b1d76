//! Asset URL resolution: stored background/attachment references → one
//! fetchable URL.
//!
//! References reach us in three shapes: absolute URLs, storage-relative
//! paths (`backgrounds/a.png`) and, when an upload was saved before the
//! storage layer moved it, the server's temporary file path
//! (`C:\Windows\Temp\php1A2B.tmp`, `/tmp/phpAbC123`). Only the last path
//! segment of a temp path is meaningful; it is re-rooted under the storage
//! base URL of the asset class.

use crate::config::ExportConfig;
use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// What an asset is used for; each class may live under its own storage base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Background,
    Attachment,
    Image,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [AssetClass::Background, AssetClass::Attachment, AssetClass::Image];
}

/// Per-export resolution context.
#[derive(Debug, Clone, Default)]
pub struct AssetContext {
    /// URLs the caller already resolved; used verbatim.
    pub resolved: HashMap<AssetClass, String>,
    /// Storage base URL per class.
    pub storage_base: HashMap<AssetClass, String>,
}

impl AssetContext {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            resolved: config.resolved_asset_urls.clone(),
            storage_base: config.storage_base_urls.clone(),
        }
    }
}

/// Markers of a server-side temporary upload path.
const TEMP_MARKERS: [&str; 5] = ["/tmp/", "\\temp\\", "/temp/", "\\tmp\\", "/var/folders/"];

/// True when `reference` can be fetched as-is.
pub fn is_absolute_url(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

/// True when `reference` is a local filesystem path rather than a storage key.
pub fn is_local_temp_path(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    reference.contains('\\') || TEMP_MARKERS.iter().any(|m| lower.contains(m)) || lower.starts_with("/tmp")
}

/// Resolve `reference` of `class` to a fetchable URL.
///
/// Returns `Ok(None)` for an empty reference: no background is a valid,
/// common state. Returns [`PageError::AssetUnresolved`] when the reference
/// needs a storage base that is not configured.
pub fn resolve_asset_url(
    reference: &str,
    class: AssetClass,
    ctx: &AssetContext,
) -> Result<Option<String>, PageError> {
    let reference = reference.trim();
    if let Some(url) = ctx.resolved.get(&class).filter(|u| !u.trim().is_empty()) {
        debug!("{:?} asset uses caller-resolved URL {}", class, url);
        return Ok(Some(url.clone()));
    }
    if reference.is_empty() {
        return Ok(None);
    }
    if is_absolute_url(reference) {
        return Ok(Some(reference.to_string()));
    }

    let key = if is_local_temp_path(reference) {
        let segment = reference
            .rsplit(['/', '\\'])
            .find(|s| !s.is_empty())
            .unwrap_or(reference);
        debug!("{:?} asset '{}' is a temp path; using segment '{}'", class, reference, segment);
        segment.to_string()
    } else {
        reference.trim_start_matches(['/', '\\']).replace('\\', "/")
    };

    let base = ctx
        .storage_base
        .get(&class)
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .ok_or_else(|| PageError::AssetUnresolved {
            page: String::new(),
            reference: reference.to_string(),
            detail: format!("no storage base URL configured for {class:?} assets"),
        })?;

    Ok(Some(join_url(base, &key)))
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}
