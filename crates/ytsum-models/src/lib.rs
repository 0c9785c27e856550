//! Shared data models for the ytsum queue.
//!
//! This crate provides Serde-serializable types for:
//! - Queue items and their status state machine
//! - Processing phases reported while an item runs
//! - Status-change events delivered to observers
//! - Video metadata and the final summary record

pub mod event;
pub mod item;
pub mod phase;
pub mod snapshot;
pub mod update;
pub mod video;

// Re-export common types
pub use event::{ChangeKind, StatusEvent};
pub use item::{ItemId, ItemStatus, QueueItem};
pub use phase::Phase;
pub use snapshot::QueueSnapshot;
pub use update::ItemUpdate;
pub use video::{SummaryRecord, VideoMetadata};
