//! Point-in-time view of the queue partitioned by status.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ItemId, ItemStatus, QueueItem};

/// Items grouped into one bucket per status, each in enqueue order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueueSnapshot {
    pub todo: Vec<QueueItem>,
    pub in_progress: Vec<QueueItem>,
    pub completed: Vec<QueueItem>,
    pub failed: Vec<QueueItem>,
}

impl QueueSnapshot {
    /// Build a snapshot from items in enqueue order.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a QueueItem>) -> Self {
        let mut snapshot = Self::default();
        for item in items {
            snapshot.bucket_mut(item.status).push(item.clone());
        }
        snapshot
    }

    pub fn bucket(&self, status: ItemStatus) -> &[QueueItem] {
        match status {
            ItemStatus::Todo => &self.todo,
            ItemStatus::InProgress => &self.in_progress,
            ItemStatus::Completed => &self.completed,
            ItemStatus::Failed => &self.failed,
        }
    }

    fn bucket_mut(&mut self, status: ItemStatus) -> &mut Vec<QueueItem> {
        match status {
            ItemStatus::Todo => &mut self.todo,
            ItemStatus::InProgress => &mut self.in_progress,
            ItemStatus::Completed => &mut self.completed,
            ItemStatus::Failed => &mut self.failed,
        }
    }

    /// Number of items across all buckets.
    pub fn total(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.completed.len() + self.failed.len()
    }

    /// All item IDs, bucket by bucket.
    pub fn ids(&self) -> Vec<ItemId> {
        ItemStatus::ALL
            .iter()
            .flat_map(|status| self.bucket(*status).iter().map(|item| item.id.clone()))
            .collect()
    }

    /// True when nothing is waiting or running.
    pub fn is_idle(&self) -> bool {
        self.todo.is_empty() && self.in_progress.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemUpdate;

    #[test]
    fn test_partition_by_status() {
        let a = QueueItem::new("a", None);
        let mut b = QueueItem::new("b", None);
        b.apply(ItemUpdate::Started);
        let mut c = QueueItem::new("c", None);
        c.apply(ItemUpdate::Started);
        c.apply(ItemUpdate::Failed("nope".into()));

        let snapshot = QueueSnapshot::from_items([&a, &b, &c]);
        assert_eq!(snapshot.todo.len(), 1);
        assert_eq!(snapshot.in_progress.len(), 1);
        assert_eq!(snapshot.failed.len(), 1);
        assert!(snapshot.completed.is_empty());
        assert_eq!(snapshot.total(), 3);
        assert!(!snapshot.is_idle());

        let ids = snapshot.ids();
        assert!(ids.contains(&a.id) && ids.contains(&b.id) && ids.contains(&c.id));
    }

    #[test]
    fn test_serializes_bucket_names() {
        let json = serde_json::to_value(QueueSnapshot::default()).unwrap();
        for key in ["todo", "in_progress", "completed", "failed"] {
            assert!(json.get(key).is_some(), "missing bucket {}", key);
        }
    }
}
