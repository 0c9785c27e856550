//! Status listener registration and dispatch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error};

use ytsum_models::StatusEvent;

/// Result returned by a listener; errors are logged and otherwise ignored.
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Observer notified on every status or phase change.
///
/// Called synchronously outside the queue lock, one event at a time in `seq`
/// order. Errors and panics are isolated from the queue.
pub trait StatusListener: Send + Sync {
    fn on_status_change(&self, event: &StatusEvent) -> ListenerResult;

    /// A closed listener is dropped from the registry after the next dispatch.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> StatusListener for F
where
    F: Fn(&StatusEvent) -> ListenerResult + Send + Sync,
{
    fn on_status_change(&self, event: &StatusEvent) -> ListenerResult {
        self(event)
    }
}

/// Handle returned on registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener that forwards every event into an unbounded channel.
///
/// Backs `QueueManager::subscribe`; transports drain the receiver.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusListener for ChannelListener {
    fn on_status_change(&self, event: &StatusEvent) -> ListenerResult {
        // A dropped receiver is not an error; the registry prunes us.
        let _ = self.tx.send(event.clone());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

type Entry = (ListenerId, Arc<dyn StatusListener>);

/// Ordered list of registered listeners.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<Entry>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, listener: Arc<dyn StatusListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to every listener in registration order.
    pub(crate) fn dispatch(&self, event: &StatusEvent) {
        let listeners: Vec<Entry> = self.listeners.read().clone();
        let mut saw_closed = false;

        for (id, listener) in &listeners {
            if listener.is_closed() {
                saw_closed = true;
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| listener.on_status_change(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        listener = ?id,
                        item_id = %event.item_id,
                        kind = event.kind.as_str(),
                        "Status listener failed: {}", e
                    );
                }
                Err(_) => {
                    error!(
                        listener = ?id,
                        item_id = %event.item_id,
                        kind = event.kind.as_str(),
                        "Status listener panicked"
                    );
                }
            }
        }

        if saw_closed {
            let mut listeners = self.listeners.write();
            let before = listeners.len();
            listeners.retain(|(_, listener)| !listener.is_closed());
            debug!("Pruned {} closed status listeners", before - listeners.len());
        }
    }
}
