//! Video metadata and the stored summary record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ItemId, QueueItem};

/// Metadata extracted for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Duration in seconds, if the extractor reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    /// Canonical video URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,
}

impl VideoMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            channel: None,
            thumbnail_url: None,
            duration_secs: None,
            webpage_url: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_duration(mut self, duration_secs: u64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }
}

/// Final record handed to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryRecord {
    pub item_id: ItemId,
    pub url: String,
    pub metadata: VideoMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    /// Assembled markdown summary
    pub summary: String,
    /// Number of windows the summary was built from (1 when not chunked)
    pub windows: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_log_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunk_logs: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl SummaryRecord {
    /// Build a record for an item from its metadata and summary text.
    pub fn for_item(item: &QueueItem, metadata: VideoMetadata, summary: String, windows: u32) -> Self {
        Self {
            item_id: item.id.clone(),
            url: item.url.clone(),
            metadata,
            custom_prompt: item.custom_prompt.clone(),
            summary,
            windows,
            chat_log_path: None,
            chunk_logs: Vec::new(),
            generated_at: Utc::now(),
        }
    }
}
