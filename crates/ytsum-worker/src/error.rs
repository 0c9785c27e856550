//! Worker error types.

use thiserror::Error;

use crate::collaborators::{MetadataError, StorageError, SummaryError};
use crate::retry::RetryError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that end processing of an item.
///
/// The display string becomes the item's `error_message`.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Metadata extraction failed: {0}")]
    MetadataExtraction(#[from] MetadataError),

    #[error("Summary generation failed: {0}")]
    SummaryGeneration(#[from] RetryError<SummaryError>),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if the failure came from a provider quota.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(
            self,
            WorkerError::SummaryGeneration(retry) if retry.last_error().is_quota_exceeded()
        )
    }
}
