//! Queue manager: item ownership plus the single background worker.

use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use ytsum_models::{
    ChangeKind, ItemId, ItemStatus, ItemUpdate, QueueItem, QueueSnapshot, StatusEvent,
};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::listener::{ChannelListener, ListenerId, ListenerRegistry, StatusListener};
use crate::runner::{JobRunner, UpdateSink};

/// Items in enqueue order plus the FIFO of waiting IDs.
#[derive(Default)]
struct QueueState {
    items: Vec<QueueItem>,
    index: HashMap<ItemId, usize>,
    pending: VecDeque<ItemId>,
    /// Sequence number of the last emitted event
    seq: u64,
    /// Events not yet delivered, in `seq` order
    outbox: VecDeque<StatusEvent>,
    /// Set while some caller is delivering the outbox
    draining: bool,
}

impl QueueState {
    fn item_mut(&mut self, id: &ItemId) -> Option<&mut QueueItem> {
        let idx = *self.index.get(id)?;
        self.items.get_mut(idx)
    }

    /// Queue an event for delivery.
    ///
    /// Returns true if the caller must drain the outbox, false if another
    /// caller is already draining and will deliver it.
    fn emit(&mut self, item: QueueItem, kind: ChangeKind) -> bool {
        self.seq += 1;
        self.outbox.push_back(StatusEvent::new(self.seq, item, kind));
        !std::mem::replace(&mut self.draining, true)
    }
}

struct Inner {
    config: QueueConfig,
    state: Mutex<QueueState>,
    listeners: ListenerRegistry,
    runner: Arc<dyn JobRunner>,
    /// Woken on enqueue so an idle worker picks up new items
    wake: Notify,
    /// Woken whenever the outbox has been fully delivered
    settled: Notify,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Pop the next waiting item and mark it in progress.
    fn dequeue_next(&self) -> Option<QueueItem> {
        let (item, drain) = {
            let mut state = self.state.lock();
            let id = state.pending.pop_front()?;
            let item = state.item_mut(&id)?;
            item.apply(ItemUpdate::Started)?;
            let item = item.clone();
            let drain = state.emit(item.clone(), ChangeKind::Started);
            (item, drain)
        };

        if drain {
            self.drain_outbox();
        }
        Some(item)
    }

    /// Apply an update under the lock, then notify listeners outside it.
    fn apply_update(&self, id: &ItemId, update: ItemUpdate) -> Option<QueueItem> {
        let (item, drain) = {
            let mut state = self.state.lock();
            let item = state.item_mut(id)?;
            let Some(kind) = item.apply(update) else {
                debug!(item_id = %id, status = %item.status, "Ignoring update not allowed in current state");
                return None;
            };
            let item = item.clone();
            let drain = state.emit(item.clone(), kind);
            (item, drain)
        };

        if drain {
            self.drain_outbox();
        }
        Some(item)
    }

    /// Deliver queued events in `seq` order until the outbox is empty.
    ///
    /// Only one caller drains at a time, so listeners see events in the
    /// order they were produced even when producers run on other threads.
    fn drain_outbox(&self) {
        loop {
            let event = {
                let mut state = self.state.lock();
                match state.outbox.pop_front() {
                    Some(event) => event,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };

            self.listeners.dispatch(&event);
        }
        self.settled.notify_waiters();
    }

    fn status_of(&self, id: &ItemId) -> Option<ItemStatus> {
        let state = self.state.lock();
        let idx = *state.index.get(id)?;
        state.items.get(idx).map(|item| item.status)
    }

    /// No item waiting or in progress, and every event delivered.
    fn is_idle(&self) -> bool {
        let state = self.state.lock();
        !state.draining
            && state.outbox.is_empty()
            && state
                .items
                .iter()
                .all(|item| !matches!(item.status, ItemStatus::Todo | ItemStatus::InProgress))
    }
}

impl UpdateSink for Inner {
    fn update(&self, id: &ItemId, update: ItemUpdate) {
        self.apply_update(id, update);
    }
}

/// Thread-safe FIFO queue processed by a single background worker.
///
/// Cloning is cheap and every clone refers to the same queue.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<Inner>,
}

impl QueueManager {
    /// Create a new queue. The worker does not run until [`start`](Self::start).
    pub fn new(config: QueueConfig, runner: Arc<dyn JobRunner>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(QueueState::default()),
                listeners: ListenerRegistry::default(),
                runner,
                wake: Notify::new(),
                settled: Notify::new(),
                shutdown,
                worker: Mutex::new(None),
            }),
        }
    }

    /// Add a URL to the end of the queue and return its ID.
    ///
    /// Never waits for processing.
    pub fn enqueue(&self, url: &str, custom_prompt: Option<String>) -> QueueResult<ItemId> {
        let url = url.trim();
        if url.is_empty() {
            return Err(QueueError::invalid_input("url must not be empty"));
        }
        let custom_prompt = custom_prompt.filter(|p| !p.trim().is_empty());

        let (id, drain) = {
            let mut state = self.inner.state.lock();
            if let Some(max) = self.inner.config.max_queue_size {
                if state.pending.len() >= max {
                    return Err(QueueError::configuration(format!(
                        "queue is full ({} items waiting, max {})",
                        state.pending.len(),
                        max
                    )));
                }
            }

            let item = QueueItem::new(url, custom_prompt);
            let id = item.id.clone();
            let position = state.items.len();
            state.index.insert(id.clone(), position);
            state.pending.push_back(id.clone());
            state.items.push(item.clone());
            (id, state.emit(item, ChangeKind::Enqueued))
        };

        info!(item_id = %id, url = %url, "Enqueued item");
        self.inner.wake.notify_one();
        if drain {
            self.inner.drain_outbox();
        }
        Ok(id)
    }

    /// Snapshot of all items grouped by status.
    pub fn get_status(&self) -> QueueSnapshot {
        let state = self.inner.state.lock();
        QueueSnapshot::from_items(state.items.iter())
    }

    /// Copy of a single item.
    pub fn get_item(&self, id: &ItemId) -> QueueResult<QueueItem> {
        let state = self.inner.state.lock();
        state
            .index
            .get(id)
            .and_then(|idx| state.items.get(*idx))
            .cloned()
            .ok_or_else(|| QueueError::NotFound(id.clone()))
    }

    /// Total number of items ever enqueued.
    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a listener. Listeners are called in registration order.
    pub fn add_status_listener(&self, listener: Arc<dyn StatusListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove_status_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Receive every subsequent event through a channel.
    ///
    /// The channel is unbounded so no event is dropped or coalesced; the
    /// listener is removed once the receiver is dropped.
    pub fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<StatusEvent>) {
        let (listener, rx) = ChannelListener::new();
        let id = self.add_status_listener(Arc::new(listener));
        (id, rx)
    }

    /// Spawn the background worker on the current tokio runtime.
    ///
    /// Returns false if a worker is already running.
    pub fn start(&self) -> bool {
        let mut worker = self.inner.worker.lock();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        self.inner.shutdown.send_replace(false);
        let shutdown_rx = self.inner.shutdown.subscribe();
        let inner = Arc::clone(&self.inner);
        *worker = Some(tokio::spawn(worker_loop(inner, shutdown_rx)));
        true
    }

    /// Ask the worker to exit once the current item (if any) finishes.
    pub fn request_stop(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// Request shutdown and wait for the worker to exit.
    ///
    /// Items still waiting remain in `todo`.
    pub async fn stop(&self) {
        self.request_stop();
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Queue worker task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait until no item is waiting or in progress.
    ///
    /// Does not resolve while items remain in `todo` after a stop.
    pub async fn wait_idle(&self) {
        loop {
            let settled = self.inner.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            if self.inner.is_idle() {
                return;
            }
            settled.await;
        }
    }
}

async fn worker_loop(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    info!("Queue worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let Some(item) = inner.dequeue_next() else {
            tokio::select! {
                _ = inner.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        };

        let id = item.id.clone();
        info!(item_id = %id, url = %item.url, "Processing item");

        let run = inner.runner.run(item, inner.as_ref());
        if AssertUnwindSafe(run).catch_unwind().await.is_err() {
            error!(item_id = %id, "Job runner panicked");
            inner.apply_update(&id, ItemUpdate::Failed("internal error: processing panicked".into()));
        }

        if inner.status_of(&id) == Some(ItemStatus::InProgress) {
            warn!(item_id = %id, "Job runner returned without a terminal status");
            inner.apply_update(
                &id,
                ItemUpdate::Failed("processing ended without a result".into()),
            );
        }
    }

    info!("Queue worker stopped");
}
