//! Seam between the queue and whatever processes an item.

use async_trait::async_trait;
use ytsum_models::{ItemId, ItemUpdate, QueueItem};

/// Receives updates for the item currently being processed.
///
/// Implemented by the queue manager; each call is applied to the stored item
/// before it returns and queued for status listeners in `seq` order.
pub trait UpdateSink: Send + Sync {
    fn update(&self, id: &ItemId, update: ItemUpdate);
}

/// Processes a single dequeued item end-to-end.
///
/// Implementations must finish every run with a terminal update
/// (`Completed` or `Failed`) through the sink. The queue fails any item left
/// in progress once `run` returns.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, item: QueueItem, sink: &dyn UpdateSink);
}
