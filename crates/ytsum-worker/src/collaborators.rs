//! Contracts for the external collaborators the pipeline drives.
//!
//! Each collaborator is a capability trait so tests and alternative
//! backends can substitute their own implementation.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use ytsum_models::{SummaryRecord, VideoMetadata};

use crate::chunking::ChunkWindow;
use crate::retry::{parse_retry_delay, Classify, ErrorClass};

/// Metadata extraction errors. Never retried.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Video unavailable: {0}")]
    Unavailable(String),

    #[error("Extractor failed: {0}")]
    Failed(String),

    #[error("Extractor timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid extractor output: {0}")]
    InvalidOutput(String),
}

impl MetadataError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Summary generation errors.
#[derive(Debug, Clone, Error)]
pub enum SummaryError {
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        retry_delay: Option<Duration>,
    },

    #[error("Summary generation failed: {0}")]
    Generation(String),

    #[error("Summary request timed out: {0}")]
    Timeout(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SummaryError {
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Quota error with the delay suggested in the provider payload, if any.
    pub fn quota(message: impl Into<String>) -> Self {
        let message = message.into();
        let retry_delay = parse_retry_delay(&message);
        Self::QuotaExceeded {
            message,
            retry_delay,
        }
    }

    /// Map a provider HTTP error response.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status, body.trim());
        match status {
            429 => Self::quota(detail),
            _ if body.contains("RESOURCE_EXHAUSTED") => Self::quota(detail),
            401 | 403 => Self::Auth(detail),
            408 => Self::Timeout(detail),
            400..=499 => Self::InvalidRequest(detail),
            _ => Self::Generation(detail),
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, SummaryError::QuotaExceeded { .. })
    }
}

impl Classify for SummaryError {
    fn classify(&self) -> ErrorClass {
        match self {
            SummaryError::QuotaExceeded { retry_delay, .. } => ErrorClass::Quota {
                suggested_delay: *retry_delay,
            },
            SummaryError::Generation(_) | SummaryError::Timeout(_) => ErrorClass::Transient,
            SummaryError::Auth(_) | SummaryError::InvalidRequest(_) => ErrorClass::Fatal,
        }
    }
}

/// Storage errors. Never retried.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage write failed: {0}")]
    WriteFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input for one summary call.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    pub url: String,
    pub metadata: VideoMetadata,
    pub prompt: String,
    /// Time window to summarize; `None` means the whole video
    pub window: Option<ChunkWindow>,
    /// Summary of earlier windows
    pub context: Option<String>,
}

impl SummaryRequest {
    pub fn new(url: impl Into<String>, metadata: VideoMetadata, prompt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            metadata,
            prompt: prompt.into(),
            window: None,
            context: None,
        }
    }

    pub fn with_window(mut self, window: ChunkWindow, context: Option<String>) -> Self {
        self.window = Some(window);
        self.context = context;
        self
    }
}

/// Output of one summary call.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutput {
    /// Markdown summary text
    pub markdown: String,
    /// Reference to the persisted conversation log, if one was written
    pub log_path: Option<String>,
}

impl SummaryOutput {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            log_path: None,
        }
    }
}

/// Fetches title, channel, thumbnail and duration for a URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<VideoMetadata, MetadataError>;
}

/// Generates a markdown summary for a video or one window of it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryWriter: Send + Sync {
    async fn generate(&self, request: &SummaryRequest) -> Result<SummaryOutput, SummaryError>;
}

/// Persists the final record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    async fn store(&self, record: &SummaryRecord) -> Result<(), StorageError>;
}
