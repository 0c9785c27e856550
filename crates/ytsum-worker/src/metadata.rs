//! Video metadata using yt-dlp.
//!
//! Runs `yt-dlp --dump-json` without downloading and reads the fields the
//! pipeline needs from its info JSON.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use ytsum_models::VideoMetadata;

use crate::collaborators::{MetadataError, MetadataExtractor};

/// Subset of the yt-dlp info JSON.
#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
}

/// Metadata extractor backed by the yt-dlp CLI.
#[derive(Debug, Clone)]
pub struct YtDlpMetadataExtractor {
    bin: String,
    timeout: Duration,
}

impl YtDlpMetadataExtractor {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }

    /// Parse yt-dlp info JSON into metadata.
    pub fn parse_info(json: &str) -> Result<VideoMetadata, MetadataError> {
        let info: InfoJson =
            serde_json::from_str(json).map_err(|e| MetadataError::InvalidOutput(e.to_string()))?;

        let title = info
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| MetadataError::InvalidOutput("missing title".to_string()))?;

        Ok(VideoMetadata {
            title,
            channel: info.channel.or(info.uploader).filter(|c| !c.is_empty()),
            thumbnail_url: info.thumbnail,
            duration_secs: info
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| d.round() as u64),
            webpage_url: info.webpage_url,
        })
    }

    /// Map a failed run's stderr to an error.
    fn classify_failure(stderr: &str) -> MetadataError {
        let message = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("Unknown error")
            .trim()
            .to_string();

        let unavailable = stderr.contains("Video unavailable")
            || stderr.contains("Private video")
            || stderr.contains("This video has been removed")
            || stderr.contains("is not a valid URL")
            || stderr.contains("Unsupported URL");

        if unavailable {
            MetadataError::Unavailable(message)
        } else {
            MetadataError::Failed(message)
        }
    }
}

#[async_trait]
impl MetadataExtractor for YtDlpMetadataExtractor {
    async fn extract(&self, url: &str) -> Result<VideoMetadata, MetadataError> {
        debug!("Fetching metadata with {} for {}", self.bin, url);

        let child = Command::new(&self.bin)
            .args(["--dump-json", "--no-download", "--no-playlist", "--no-warnings"])
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| MetadataError::Timeout(self.timeout))?
            .map_err(|e| MetadataError::failed(format!("failed to run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(Self::classify_failure(&stderr));
        }

        Self::parse_info(&String::from_utf8_lossy(&output.stdout))
    }
}
