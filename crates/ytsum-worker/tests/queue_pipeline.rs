//! Queue + pipeline integration tests with in-memory collaborators.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use ytsum_models::{ChangeKind, ItemId, ItemStatus, Phase, StatusEvent, SummaryRecord, VideoMetadata};
use ytsum_queue::{QueueConfig, QueueManager};
use ytsum_worker::{
    MetadataError, MetadataExtractor, ProcessingPipeline, RetryPolicy, Storage, StorageError,
    SummaryError, SummaryOutput, SummaryRequest, SummaryWriter, WorkerConfig,
};

/// Videos whose URL contains "missing" are unavailable; "long" ones run 90 minutes.
struct FakeExtractor;

#[async_trait]
impl MetadataExtractor for FakeExtractor {
    async fn extract(&self, url: &str) -> Result<VideoMetadata, MetadataError> {
        if url.contains("missing") {
            return Err(MetadataError::Unavailable("Video unavailable".into()));
        }
        let duration = if url.contains("long") { 5400 } else { 600 };
        Ok(VideoMetadata::new(format!("Title of {}", url)).with_duration(duration))
    }
}

/// Echoes the window it was asked for; always over quota when `quota` is set.
#[derive(Default)]
struct FakeWriter {
    quota: bool,
    requests: Mutex<Vec<SummaryRequest>>,
}

#[async_trait]
impl SummaryWriter for FakeWriter {
    async fn generate(&self, request: &SummaryRequest) -> Result<SummaryOutput, SummaryError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.quota {
            return Err(SummaryError::quota(
                r#"HTTP 429: {"error":{"status":"RESOURCE_EXHAUSTED","details":[{"retryDelay":"18s"}]}}"#,
            ));
        }
        let markdown = match request.window {
            Some(w) => format!("Part {} of {}.", w.index, request.metadata.title),
            None => format!("Summary of {}.", request.metadata.title),
        };
        Ok(SummaryOutput {
            markdown,
            log_path: Some(format!("/logs/{}.json", self.requests.lock().unwrap().len())),
        })
    }
}

#[derive(Default)]
struct MemoryStorage {
    records: Mutex<Vec<SummaryRecord>>,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(&self, record: &SummaryRecord) -> Result<(), StorageError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct Harness {
    queue: QueueManager,
    writer: Arc<FakeWriter>,
    storage: Arc<MemoryStorage>,
    events: UnboundedReceiver<StatusEvent>,
}

fn harness(writer: FakeWriter) -> Harness {
    let mut config = WorkerConfig::default();
    config.retry = RetryPolicy::default().with_test_mode(true);

    let writer = Arc::new(writer);
    let storage = Arc::new(MemoryStorage::default());
    let pipeline = ProcessingPipeline::new(
        &config,
        Arc::new(FakeExtractor),
        writer.clone(),
        storage.clone(),
    )
    .unwrap();

    let queue = QueueManager::new(QueueConfig::default(), Arc::new(pipeline));
    let (_, events) = queue.subscribe();
    Harness {
        queue,
        writer,
        storage,
        events,
    }
}

fn drain(events: &mut UnboundedReceiver<StatusEvent>) -> Vec<StatusEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn position(events: &[StatusEvent], id: &ItemId, kind: ChangeKind) -> usize {
    events
        .iter()
        .position(|e| &e.item_id == id && e.kind == kind)
        .unwrap_or_else(|| panic!("no {:?} event for {}", kind, id))
}

#[tokio::test]
async fn test_fifo_with_metadata_failure() {
    let mut h = harness(FakeWriter::default());
    let a = h.queue.enqueue("https://youtu.be/a", None).unwrap();
    let b = h.queue.enqueue("https://youtu.be/missing", None).unwrap();
    let c = h.queue.enqueue("https://youtu.be/c", None).unwrap();

    h.queue.start();
    h.queue.wait_idle().await;
    h.queue.stop().await;

    let snapshot = h.queue.get_status();
    let completed: Vec<_> = snapshot.completed.iter().map(|i| i.id.clone()).collect();
    assert_eq!(completed, vec![a.clone(), c.clone()]);
    assert_eq!(snapshot.failed.len(), 1);

    let failed = h.queue.get_item(&b).unwrap();
    assert_eq!(failed.status, ItemStatus::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Metadata extraction failed"));

    let events = drain(&mut h.events);
    assert!(position(&events, &a, ChangeKind::Completed) < position(&events, &b, ChangeKind::Started));
    assert!(position(&events, &b, ChangeKind::Failed) < position(&events, &c, ChangeKind::Started));

    // Only A and C reached the writer and storage
    assert_eq!(h.writer.requests.lock().unwrap().len(), 2);
    let stored: Vec<_> = h
        .storage
        .records
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.item_id.clone())
        .collect();
    assert_eq!(stored, vec![a, c]);
}

#[tokio::test]
async fn test_chunked_item_reports_each_window() {
    let mut h = harness(FakeWriter::default());
    let id = h.queue.enqueue("https://youtu.be/long", Some("Key ideas".into())).unwrap();

    h.queue.start();
    h.queue.wait_idle().await;
    h.queue.stop().await;

    let events = drain(&mut h.events);
    let chunk_events: Vec<_> = events
        .iter()
        .filter(|e| e.kind == ChangeKind::PhaseChanged)
        .map(|e| (e.item.current_phase, e.item.current_chunk, e.item.total_chunks))
        .collect();
    assert_eq!(
        chunk_events,
        vec![
            (Some(Phase::MetadataExtraction), None, None),
            (Some(Phase::Chunk { index: 1, total: 2 }), Some(1), Some(2)),
            (Some(Phase::Chunk { index: 2, total: 2 }), Some(2), Some(2)),
            (Some(Phase::StorageUpload), Some(2), Some(2)),
        ]
    );

    // Sequence numbers strictly increase
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));

    let item = h.queue.get_item(&id).unwrap();
    assert_eq!(item.status, ItemStatus::Completed);
    assert_eq!(item.current_phase, None);
    assert_eq!(item.duration_secs, Some(5400));
    assert_eq!(item.chunk_logs.len(), 2);

    let requests = h.writer.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.prompt == "Key ideas"));
    assert_eq!(requests[0].context, None);
    assert_eq!(
        requests[1].context.as_deref(),
        Some("Part 1 of Title of https://youtu.be/long.")
    );

    let records = h.storage.records.lock().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].windows, 2);
    assert_eq!(records[0].custom_prompt.as_deref(), Some("Key ideas"));
}

#[tokio::test(start_paused = true)]
async fn test_quota_exhaustion_fails_item_and_queue_moves_on() {
    let mut h = harness(FakeWriter {
        quota: true,
        ..Default::default()
    });
    let first = h.queue.enqueue("https://youtu.be/a", None).unwrap();
    let second = h.queue.enqueue("https://youtu.be/missing", None).unwrap();

    h.queue.start();
    h.queue.wait_idle().await;
    h.queue.stop().await;

    let item = h.queue.get_item(&first).unwrap();
    assert_eq!(item.status, ItemStatus::Failed);
    assert!(item.error_message.as_deref().unwrap().contains("Quota exceeded"));
    // Initial attempt plus three retries
    assert_eq!(h.writer.requests.lock().unwrap().len(), 4);

    assert_eq!(h.queue.get_item(&second).unwrap().status, ItemStatus::Failed);
    assert!(h.storage.records.lock().unwrap().is_empty());

    let terminal: Vec<_> = drain(&mut h.events)
        .into_iter()
        .filter(|e| e.kind.is_terminal())
        .map(|e| e.item_id)
        .collect();
    assert_eq!(terminal, vec![first, second]);
}

#[tokio::test]
async fn test_snapshot_partitions_and_is_idempotent() {
    let h = harness(FakeWriter::default());
    let urls = [
        "https://youtu.be/1",
        "https://youtu.be/missing",
        "https://youtu.be/long",
        "https://youtu.be/4",
    ];
    let ids: HashSet<ItemId> = urls
        .iter()
        .map(|url| h.queue.enqueue(url, None).unwrap())
        .collect();

    let before = h.queue.get_status();
    assert_eq!(before.todo.len(), 4);
    assert_eq!(before, h.queue.get_status());

    h.queue.start();
    h.queue.wait_idle().await;
    h.queue.stop().await;

    let snapshot = h.queue.get_status();
    assert_eq!(snapshot, h.queue.get_status());
    assert_eq!(snapshot.total(), 4);
    assert!(snapshot.todo.is_empty() && snapshot.in_progress.is_empty());

    let listed: HashSet<ItemId> = snapshot.ids().into_iter().collect();
    assert_eq!(listed, ids);
    assert_eq!(snapshot.completed.len(), 3);
    assert_eq!(snapshot.failed.len(), 1);
}
