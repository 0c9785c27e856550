//! Structured per-item logging.
//!
//! Every line carries the item ID and operation so interleaved output from
//! the pipeline and its collaborators can be filtered per item.

use tracing::{error, info, warn, Span};

use ytsum_models::{ItemId, Phase, SummaryRecord};

use crate::error::WorkerError;

/// Logs one item's lifecycle with consistent fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    item_id: ItemId,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(item_id: &ItemId, operation: &'static str) -> Self {
        Self {
            item_id: item_id.clone(),
            operation,
        }
    }

    /// Span wrapping the whole run of this item.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", item_id = %self.item_id, operation = self.operation)
    }

    pub fn started(&self, url: &str) {
        info!(item_id = %self.item_id, operation = self.operation, url = %url, "Item started");
    }

    pub fn phase(&self, phase: Phase) {
        info!(item_id = %self.item_id, phase = %phase, "Entering {}", phase);
    }

    pub fn progress(&self, message: &str) {
        info!(item_id = %self.item_id, operation = self.operation, "{}", message);
    }

    pub fn warning(&self, message: &str) {
        warn!(item_id = %self.item_id, operation = self.operation, "{}", message);
    }

    pub fn completed(&self, record: &SummaryRecord) {
        info!(
            item_id = %self.item_id,
            operation = self.operation,
            windows = record.windows,
            "Item completed: \"{}\"", record.metadata.title
        );
    }

    /// Quota failures are tagged so they can be told apart from broken input.
    pub fn failed(&self, error: &WorkerError) {
        error!(
            item_id = %self.item_id,
            operation = self.operation,
            quota = error.is_quota_exceeded(),
            "Item failed: {}", error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_carries_item_and_operation() {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        tracing::subscriber::with_default(subscriber, || {
            let logger = JobLogger::new(&ItemId::from_string("item-1"), "summarize");
            let span = logger.span();
            let meta = span.metadata().expect("span is enabled");
            assert_eq!(meta.name(), "job");
            assert!(meta.fields().field("item_id").is_some());
            assert!(meta.fields().field("operation").is_some());

            let _entered = span.enter();
            logger.phase(Phase::Chunk { index: 1, total: 2 });
            logger.failed(&WorkerError::config_error("bad window"));
        });
    }
}
