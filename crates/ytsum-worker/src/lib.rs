//! Video summarization worker.
//!
//! This crate provides:
//! - The processing pipeline run for each queue item
//! - Quota-aware retry with provider-suggested delays
//! - Chunk planning for videos longer than one summary window
//! - Collaborator contracts plus yt-dlp, Gemini and JSON-file adapters
//! - Batch-mode progress reporting

pub mod chunking;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod storage;

pub use chunking::{ChunkPlan, ChunkPlanner, ChunkWindow, ChunkingConfig, SummaryAccumulator};
pub use collaborators::{
    MetadataError, MetadataExtractor, Storage, StorageError, SummaryError, SummaryOutput,
    SummaryRequest, SummaryWriter,
};
pub use config::{WorkerConfig, DEFAULT_PROMPT};
pub use error::{WorkerError, WorkerResult};
pub use gemini::{GeminiConfig, GeminiSummaryWriter};
pub use logging::JobLogger;
pub use metadata::YtDlpMetadataExtractor;
pub use pipeline::ProcessingPipeline;
pub use progress::ProgressPrinter;
pub use retry::{call_with_retry, parse_retry_delay, Classify, ErrorClass, RetryError, RetryPolicy};
pub use storage::JsonFileStorage;
