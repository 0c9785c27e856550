//! Mutations the worker applies to the item it is processing.

use crate::{Phase, VideoMetadata};

/// A single change reported by the processing pipeline.
///
/// Updates are applied through [`crate::QueueItem::apply`], which rejects
/// anything the state machine does not allow.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemUpdate {
    /// Worker dequeued the item
    Started,
    /// A new pipeline stage began
    Phase(Phase),
    /// Metadata extraction finished
    Metadata(VideoMetadata),
    /// Log reference for a single-pass summary
    ChatLog(String),
    /// Log reference for one chunk
    ChunkLog(String),
    /// Pipeline finished successfully
    Completed,
    /// Pipeline stopped with this error message
    Failed(String),
}

impl ItemUpdate {
    /// Check if this update ends processing of the item.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemUpdate::Completed | ItemUpdate::Failed(_))
    }
}
