//! Queue item definition and the status state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{ChangeKind, ItemUpdate, Phase};

/// Unique identifier for a queue item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Generate a new random item ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item processing status.
///
/// ```text
/// todo -> in_progress -> completed
///              |
///              +-------> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for the worker
    #[default]
    Todo,
    /// Currently held by the worker
    InProgress,
    /// Pipeline finished and the record was stored
    Completed,
    /// Pipeline stopped on an unrecoverable error
    Failed,
}

impl ItemStatus {
    /// All statuses in bucket order.
    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Todo,
        ItemStatus::InProgress,
        ItemStatus::Completed,
        ItemStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Todo => "todo",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of work in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueueItem {
    /// Unique item ID
    pub id: ItemId,

    /// Video URL
    pub url: String,

    /// Custom prompt for the summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,

    /// Current status
    #[serde(default)]
    pub status: ItemStatus,

    /// Active pipeline stage, only while in progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<Phase>,

    /// Chunk being processed (1-based), only for chunked videos
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_chunk: Option<u32>,

    /// Number of chunks, only for chunked videos
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Video duration reported by metadata extraction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,

    /// Enqueue timestamp
    pub created_at: DateTime<Utc>,

    /// Dequeue timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Terminal-state timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Failure reason, only when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Conversation log of a single-pass summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_log_path: Option<String>,

    /// Conversation logs of each chunk, in chunk order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunk_logs: Vec<String>,
}

impl QueueItem {
    /// Create a new item in `todo`.
    pub fn new(url: impl Into<String>, custom_prompt: Option<String>) -> Self {
        Self {
            id: ItemId::new(),
            url: url.into(),
            custom_prompt,
            status: ItemStatus::Todo,
            current_phase: None,
            current_chunk: None,
            total_chunks: None,
            title: None,
            channel: None,
            thumbnail_url: None,
            duration_secs: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            chat_log_path: None,
            chunk_logs: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply an update, enforcing the state machine.
    ///
    /// Returns the kind of change that happened, or `None` if the update is
    /// not allowed in the current state. A rejected update leaves the item
    /// untouched.
    pub fn apply(&mut self, update: ItemUpdate) -> Option<ChangeKind> {
        match update {
            ItemUpdate::Started => {
                if self.status != ItemStatus::Todo {
                    return None;
                }
                self.status = ItemStatus::InProgress;
                self.started_at = Some(Utc::now());
                Some(ChangeKind::Started)
            }
            ItemUpdate::Phase(phase) => {
                if self.status != ItemStatus::InProgress {
                    return None;
                }
                if let Phase::Chunk { index, total } = phase {
                    if total == 0 || index == 0 || index > total {
                        return None;
                    }
                    self.current_chunk = Some(index);
                    self.total_chunks = Some(total);
                }
                self.current_phase = Some(phase);
                Some(ChangeKind::PhaseChanged)
            }
            ItemUpdate::Metadata(meta) => {
                if self.status != ItemStatus::InProgress {
                    return None;
                }
                self.title = Some(meta.title);
                self.channel = meta.channel;
                self.thumbnail_url = meta.thumbnail_url;
                self.duration_secs = meta.duration_secs;
                Some(ChangeKind::MetadataUpdated)
            }
            ItemUpdate::ChatLog(path) => {
                if self.status != ItemStatus::InProgress {
                    return None;
                }
                self.chat_log_path = Some(path);
                Some(ChangeKind::LogAttached)
            }
            ItemUpdate::ChunkLog(path) => {
                if self.status != ItemStatus::InProgress {
                    return None;
                }
                self.chunk_logs.push(path);
                Some(ChangeKind::LogAttached)
            }
            ItemUpdate::Completed => {
                if self.status != ItemStatus::InProgress {
                    return None;
                }
                self.status = ItemStatus::Completed;
                self.current_phase = None;
                self.completed_at = Some(Utc::now());
                Some(ChangeKind::Completed)
            }
            ItemUpdate::Failed(message) => {
                if self.status != ItemStatus::InProgress {
                    return None;
                }
                self.status = ItemStatus::Failed;
                self.current_phase = None;
                self.error_message = Some(message);
                self.completed_at = Some(Utc::now());
                Some(ChangeKind::Failed)
            }
        }
    }
}
