//! File-backed persistence for the catalog, posted-item history, and
//! refresh metadata.
//!
//! Three independent JSON documents live inside one data directory:
//!
//! ```text
//! data/
//! ├── products.json   # ordered array of Item objects
//! ├── posted.json     # flat array of item-id strings
//! └── metadata.json   # { lastRefreshTimestamp, refreshCount, ...flags }
//! ```
//!
//! Each document loads independently. A missing or corrupt file degrades
//! to an empty default for that piece; load failures are logged and never
//! abort the run. Saves are whole-snapshot writes through a temp file
//! followed by a rename, so a crash mid-write cannot leave a half-written
//! document behind.

use crate::models::Item;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

const CATALOG_FILE: &str = "products.json";
const SEEN_FILE: &str = "posted.json";
const META_FILE: &str = "metadata.json";

/// Refresh bookkeeping for the catalog.
///
/// Written exactly once per refresh event and read once at manager
/// initialization to evaluate staleness. Unknown keys round-trip through
/// the `flags` map so externally written markers (e.g. a manual-refresh
/// note) survive rewrites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshMetadata {
    /// When the catalog was last wholly replaced from upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh_timestamp: Option<DateTime<Utc>>,
    /// Number of completed refresh events.
    #[serde(default)]
    pub refresh_count: u64,
    /// Free-form flags preserved verbatim.
    #[serde(flatten)]
    pub flags: serde_json::Map<String, serde_json::Value>,
}

/// Handle to the three persisted collections.
///
/// The store performs no locking: the rotation manager is the only writer
/// and the scheduling model runs one process at a time.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    catalog_path: PathBuf,
    seen_path: PathBuf,
    meta_path: PathBuf,
}

impl CatalogStore {
    /// Create a store rooted at `data_dir`. No I/O happens here.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            catalog_path: dir.join(CATALOG_FILE),
            seen_path: dir.join(SEEN_FILE),
            meta_path: dir.join(META_FILE),
        }
    }

    /// Path of the persisted catalog snapshot.
    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Load the catalog, degrading to an empty list on any failure.
    #[instrument(level = "debug", skip_all)]
    pub async fn load_catalog(&self) -> Vec<Item> {
        self.read_or_default(&self.catalog_path, "catalog").await
    }

    /// Persist the whole catalog snapshot.
    pub async fn save_catalog(&self, items: &[Item]) -> Result<(), Box<dyn Error>> {
        self.write_json(&self.catalog_path, &items).await?;
        info!(count = items.len(), path = %self.catalog_path.display(), "Wrote catalog snapshot");
        Ok(())
    }

    /// Load the posted-item history, degrading to an empty list on any failure.
    #[instrument(level = "debug", skip_all)]
    pub async fn load_seen(&self) -> Vec<String> {
        self.read_or_default(&self.seen_path, "posted history").await
    }

    /// Persist the posted-item history as a flat id array.
    pub async fn save_seen(&self, ids: &[String]) -> Result<(), Box<dyn Error>> {
        self.write_json(&self.seen_path, &ids).await?;
        debug!(count = ids.len(), "Wrote posted history");
        Ok(())
    }

    /// Load refresh metadata, degrading to defaults on any failure.
    #[instrument(level = "debug", skip_all)]
    pub async fn load_metadata(&self) -> RefreshMetadata {
        self.read_or_default(&self.meta_path, "refresh metadata").await
    }

    /// Persist the refresh metadata document.
    pub async fn save_metadata(&self, meta: &RefreshMetadata) -> Result<(), Box<dyn Error>> {
        self.write_json(&self.meta_path, meta).await?;
        debug!(refresh_count = meta.refresh_count, "Wrote refresh metadata");
        Ok(())
    }

    /// Copy the current catalog snapshot to `products.json.backup`.
    ///
    /// Called before a forced refresh so a bad upstream batch can be
    /// recovered by hand. A missing catalog is not an error.
    pub async fn backup_catalog(&self) -> Result<(), Box<dyn Error>> {
        if fs::try_exists(&self.catalog_path).await.unwrap_or(false) {
            let backup = self.catalog_path.with_extension("json.backup");
            fs::copy(&self.catalog_path, &backup).await?;
            info!(path = %backup.display(), "Backed up existing catalog");
        }
        Ok(())
    }

    /// Read one JSON document, returning `T::default()` when the file is
    /// missing or does not parse.
    async fn read_or_default<T>(&self, path: &Path, what: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) => {
                info!(path = %path.display(), error = %e, "No readable {what} file; starting empty");
                return T::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt {what} file; starting empty");
                T::default()
            }
        }
    }

    /// Pretty-print `value` to a temp file, then rename it into place.
    async fn write_json<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}
