//! Processing phases reported while an item runs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named stage of single-item processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// Fetching title, channel, thumbnail and duration
    MetadataExtraction,
    /// Single-pass summary of the whole video
    SummaryGeneration,
    /// Summary of one time window of a long video (1-based index)
    Chunk { index: u32, total: u32 },
    /// Handing the final record to storage
    StorageUpload,
}

impl Phase {
    /// Human-readable label shown to observers.
    pub fn label(&self) -> String {
        match self {
            Phase::MetadataExtraction => "metadata extraction".to_string(),
            Phase::SummaryGeneration => "summary generation".to_string(),
            Phase::Chunk { index, total } => format!("chunk {}/{}", index, total),
            Phase::StorageUpload => "storage upload".to_string(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
