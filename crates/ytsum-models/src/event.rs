//! Status-change events delivered to observers.
//!
//! Transports (SSE, WebSocket) serialize these as-is.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ItemId, QueueItem};

/// What changed on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Enqueued,
    Started,
    PhaseChanged,
    MetadataUpdated,
    LogAttached,
    Completed,
    Failed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Enqueued => "enqueued",
            ChangeKind::Started => "started",
            ChangeKind::PhaseChanged => "phase_changed",
            ChangeKind::MetadataUpdated => "metadata_updated",
            ChangeKind::LogAttached => "log_attached",
            ChangeKind::Completed => "completed",
            ChangeKind::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChangeKind::Completed | ChangeKind::Failed)
    }
}

/// A status-change notification.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusEvent {
    /// Sequence number for event ordering (monotonically increasing per queue)
    pub seq: u64,
    #[serde(rename = "itemId")]
    pub item_id: ItemId,
    /// Full snapshot of the item after the change
    pub item: QueueItem,
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(seq: u64, item: QueueItem, kind: ChangeKind) -> Self {
        Self {
            seq,
            item_id: item.id.clone(),
            item,
            kind,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let item = QueueItem::new("https://youtu.be/xyz", None);
        let event = StatusEvent::new(7, item.clone(), ChangeKind::Enqueued);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["itemId"], item.id.as_str());
        assert_eq!(json["kind"], "enqueued");
        assert_eq!(json["item"]["status"], "todo");
    }

    #[test]
    fn test_event_schema_names_fields() {
        let schema = schemars::schema_for!(StatusEvent);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("itemId"));
        assert!(json.contains("phase_changed"));
    }
}
