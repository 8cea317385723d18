//! JSON file store: one document on local disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use keyshare_core::config::StoreConfig;
use keyshare_core::error::{AppError, ErrorKind};
use keyshare_entity::StoreSnapshot;

use crate::accessor::SnapshotStore;

/// Persists the snapshot as a single JSON document.
///
/// Writes go to a sibling temp file which is then renamed over the
/// document, so a reader never observes a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    /// Path to the document.
    path: PathBuf,
    /// Indent output.
    pretty: bool,
}

impl JsonFileStore {
    /// Create a store for the given path. Nothing is touched on disk.
    pub fn new(path: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            path: path.into(),
            pretty,
        }
    }

    /// Create a store from configuration.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.data_file, config.pretty)
    }

    /// The document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `seed` if the document does not exist yet.
    ///
    /// Returns `true` when the seed was written.
    pub async fn ensure_initialized(&self, seed: &StoreSnapshot) -> Result<bool, AppError> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::with_source(
                        ErrorKind::StoreUnavailable,
                        format!("Failed to create data directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }

        self.write_snapshot(seed).await?;
        info!(path = %self.path.display(), "Initialized new data file");
        Ok(true)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn read_snapshot(&self) -> Result<StoreSnapshot, AppError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::StoreUnavailable,
                format!("Failed to read '{}'", self.path.display()),
                e,
            )
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::with_source(
                ErrorKind::StoreUnavailable,
                format!("Data file '{}' is not a valid snapshot", self.path.display()),
                e,
            )
        })
    }

    async fn write_snapshot(&self, snapshot: &StoreSnapshot) -> Result<(), AppError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(snapshot)?
        } else {
            serde_json::to_vec(snapshot)?
        };

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::StoreUnavailable,
                format!("Failed to write '{}'", tmp.display()),
                e,
            )
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::StoreUnavailable,
                format!("Failed to replace '{}'", self.path.display()),
                e,
            )
        })?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Snapshot written");
        Ok(())
    }
}
