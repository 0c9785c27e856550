//! JSON file storage for summary records.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use ytsum_models::{ItemId, SummaryRecord};

use crate::collaborators::{Storage, StorageError};

/// Writes each record to `<dir>/<item_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a record for this item is written to.
    pub fn path_for(&self, item_id: &ItemId) -> PathBuf {
        self.dir.join(format!("{}.json", item_id))
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn store(&self, record: &SummaryRecord) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(&record.item_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(record)?;

        // Readers never see a partially written record
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!("Failed to remove {}: {}", tmp.display(), cleanup);
            }
            return Err(StorageError::WriteFailed(format!(
                "rename to {}: {}",
                path.display(),
                e
            )));
        }

        info!(item_id = %record.item_id, "Stored summary at {}", path.display());
        Ok(())
    }
}
