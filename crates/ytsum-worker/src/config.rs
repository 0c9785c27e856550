//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::chunking::ChunkingConfig;
use crate::gemini::GeminiConfig;
use crate::retry::RetryPolicy;

/// Prompt used when an item has no custom prompt.
pub const DEFAULT_PROMPT: &str = "Summarize this YouTube video in Markdown. \
Start with a one-paragraph overview, then list the key points under short headings, \
and finish with the main takeaways. Keep names, numbers and claims faithful to the video.";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Window planning for long videos
    pub chunking: ChunkingConfig,
    /// Retry policy for summary calls
    pub retry: RetryPolicy,
    /// Prompt used when an item has none
    pub default_prompt: String,
    /// Gemini client settings
    pub gemini: GeminiConfig,
    /// yt-dlp executable
    pub ytdlp_bin: String,
    /// Metadata extraction timeout
    pub metadata_timeout: Duration,
    /// Directory summary records are written to
    pub output_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retry: RetryPolicy::default(),
            default_prompt: DEFAULT_PROMPT.to_string(),
            gemini: GeminiConfig::default(),
            ytdlp_bin: "yt-dlp".to_string(),
            metadata_timeout: Duration::from_secs(120),
            output_dir: PathBuf::from("./summaries"),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunking: ChunkingConfig::from_env(),
            retry: RetryPolicy::from_env(),
            default_prompt: std::env::var("YTSUM_DEFAULT_PROMPT")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.default_prompt),
            gemini: GeminiConfig::from_env(),
            ytdlp_bin: std::env::var("YTDLP_BIN").unwrap_or(defaults.ytdlp_bin),
            metadata_timeout: std::env::var("METADATA_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.metadata_timeout),
            output_dir: std::env::var("YTSUM_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        }
    }
}
