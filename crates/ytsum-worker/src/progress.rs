//! Batch-mode progress reporting.

use tracing::{error, info};

use ytsum_models::{ChangeKind, StatusEvent};
use ytsum_queue::{ListenerResult, StatusListener};

/// Status listener that logs every change through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgressPrinter;

impl ProgressPrinter {
    pub fn new() -> Self {
        Self
    }

    /// One-line description of an event.
    pub fn describe(event: &StatusEvent) -> String {
        let item = &event.item;
        let name = item.title.as_deref().unwrap_or(item.url.as_str());
        match event.kind {
            ChangeKind::Enqueued => format!("queued {}", item.url),
            ChangeKind::Started => format!("started {}", item.url),
            ChangeKind::PhaseChanged => match &item.current_phase {
                Some(phase) => format!("{}: {}", name, phase),
                None => name.to_string(),
            },
            ChangeKind::MetadataUpdated => match item.duration_secs {
                Some(d) => format!("{}: \"{}\" ({}s)", item.url, name, d),
                None => format!("{}: \"{}\"", item.url, name),
            },
            ChangeKind::LogAttached => format!("{}: conversation log saved", name),
            ChangeKind::Completed => format!("{}: completed", name),
            ChangeKind::Failed => format!(
                "{}: failed: {}",
                name,
                item.error_message.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

impl StatusListener for ProgressPrinter {
    fn on_status_change(&self, event: &StatusEvent) -> ListenerResult {
        let line = Self::describe(event);
        if event.kind == ChangeKind::Failed {
            error!(item_id = %event.item_id, seq = event.seq, "{}", line);
        } else {
            info!(item_id = %event.item_id, seq = event.seq, kind = event.kind.as_str(), "{}", line);
        }
        Ok(())
    }
}
