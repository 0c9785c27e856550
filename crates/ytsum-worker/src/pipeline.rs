//! Single-item processing pipeline.
//!
//! Runs metadata extraction, summary generation (whole video or window by
//! window) and storage for one queue item, reporting every phase through the
//! queue's [`UpdateSink`]. Each run ends with exactly one terminal update.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use ytsum_models::{ItemUpdate, Phase, QueueItem, SummaryRecord, VideoMetadata};
use ytsum_queue::{JobRunner, UpdateSink};

use crate::chunking::{ChunkPlan, ChunkPlanner, ChunkWindow, SummaryAccumulator};
use crate::collaborators::{MetadataExtractor, Storage, SummaryOutput, SummaryRequest, SummaryWriter};
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::retry::{call_with_retry, RetryPolicy};

/// Drives one item through its phases.
pub struct ProcessingPipeline {
    extractor: Arc<dyn MetadataExtractor>,
    writer: Arc<dyn SummaryWriter>,
    storage: Arc<dyn Storage>,
    planner: ChunkPlanner,
    retry: RetryPolicy,
    default_prompt: String,
}

impl ProcessingPipeline {
    /// Create a pipeline. Fails if the chunking configuration is invalid.
    pub fn new(
        config: &WorkerConfig,
        extractor: Arc<dyn MetadataExtractor>,
        writer: Arc<dyn SummaryWriter>,
        storage: Arc<dyn Storage>,
    ) -> WorkerResult<Self> {
        Ok(Self {
            extractor,
            writer,
            storage,
            planner: ChunkPlanner::new(config.chunking)?,
            retry: config.retry.clone(),
            default_prompt: config.default_prompt.clone(),
        })
    }

    /// Process an item and return the stored record.
    ///
    /// Reports phases, metadata and log references through `sink` but not
    /// the terminal update.
    pub async fn process(&self, item: &QueueItem, sink: &dyn UpdateSink) -> WorkerResult<SummaryRecord> {
        let logger = JobLogger::new(&item.id, "summarize");

        report_phase(sink, &logger, item, Phase::MetadataExtraction);
        let metadata = self.extractor.extract(&item.url).await?;
        logger.progress(&format!(
            "metadata: \"{}\" ({})",
            metadata.title,
            metadata
                .duration_secs
                .map(|d| format!("{}s", d))
                .unwrap_or_else(|| "unknown duration".to_string())
        ));
        sink.update(&item.id, ItemUpdate::Metadata(metadata.clone()));

        let prompt = item
            .custom_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(self.default_prompt.as_str());

        let plan = self.planner.plan(metadata.duration_secs);
        let record = match &plan {
            ChunkPlan::Single => {
                report_phase(sink, &logger, item, Phase::SummaryGeneration);
                let request = SummaryRequest::new(&item.url, metadata.clone(), prompt);
                let output = self.generate(&request).await?;

                let chat_log = output.log_path.clone();
                if let Some(path) = &chat_log {
                    sink.update(&item.id, ItemUpdate::ChatLog(path.clone()));
                }

                let mut record = SummaryRecord::for_item(item, metadata, output.markdown, 1);
                record.chat_log_path = chat_log;
                record
            }
            ChunkPlan::Chunked(windows) => {
                logger.progress(&format!("video split into {} windows", windows.len()));
                let (summary, chunk_logs) = self
                    .summarize_windows(item, &metadata, prompt, windows, sink, &logger)
                    .await?;

                let mut record = SummaryRecord::for_item(item, metadata, summary, plan.summary_calls());
                record.chunk_logs = chunk_logs;
                record
            }
        };

        report_phase(sink, &logger, item, Phase::StorageUpload);
        self.storage.store(&record).await?;

        Ok(record)
    }

    /// Summarize each window in order, feeding the summary so far forward.
    async fn summarize_windows(
        &self,
        item: &QueueItem,
        metadata: &VideoMetadata,
        prompt: &str,
        windows: &[ChunkWindow],
        sink: &dyn UpdateSink,
        logger: &JobLogger,
    ) -> WorkerResult<(String, Vec<String>)> {
        let mut accumulator = SummaryAccumulator::new();
        let mut chunk_logs = Vec::new();

        for window in windows {
            let phase = Phase::Chunk {
                index: window.index,
                total: window.total,
            };
            report_phase(sink, logger, item, phase);

            let request = SummaryRequest::new(&item.url, metadata.clone(), prompt)
                .with_window(*window, accumulator.context());
            let output = self.generate(&request).await?;

            if let Some(path) = output.log_path {
                sink.update(&item.id, ItemUpdate::ChunkLog(path.clone()));
                chunk_logs.push(path);
            }
            if output.markdown.trim().is_empty() {
                logger.warning(&format!(
                    "window {}/{} returned an empty summary",
                    window.index, window.total
                ));
            }
            accumulator.push(&output.markdown);
            logger.progress(&format!(
                "window {}/{} ({}) summarized",
                window.index,
                window.total,
                window.span_label()
            ));
        }

        Ok((accumulator.into_summary(), chunk_logs))
    }

    async fn generate(&self, request: &SummaryRequest) -> WorkerResult<SummaryOutput> {
        let output = call_with_retry(&self.retry, "summary_generation", || {
            self.writer.generate(request)
        })
        .await?;
        Ok(output)
    }
}

fn report_phase(sink: &dyn UpdateSink, logger: &JobLogger, item: &QueueItem, phase: Phase) {
    logger.phase(phase);
    sink.update(&item.id, ItemUpdate::Phase(phase));
}

#[async_trait]
impl JobRunner for ProcessingPipeline {
    async fn run(&self, item: QueueItem, sink: &dyn UpdateSink) {
        let logger = JobLogger::new(&item.id, "summarize");
        let span = logger.span();

        async {
            logger.started(&item.url);
            match self.process(&item, sink).await {
                Ok(record) => {
                    logger.completed(&record);
                    sink.update(&item.id, ItemUpdate::Completed);
                }
                Err(e) => {
                    logger.failed(&e);
                    sink.update(&item.id, ItemUpdate::Failed(e.to_string()));
                }
            }
        }
        .instrument(span)
        .await
    }
}
