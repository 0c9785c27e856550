//! Gemini summary writer.
//!
//! Sends the YouTube URL to the Gemini `generateContent` API as video file
//! data. Chunked calls restrict the model to a time window through
//! `videoMetadata` offsets and carry the summary of earlier windows in the
//! prompt.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunking::{format_timestamp, ChunkWindow};
use crate::collaborators::{SummaryError, SummaryOutput, SummaryRequest, SummaryWriter};
use crate::error::{WorkerError, WorkerResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Where conversation logs are written (not written when `None`)
    pub chat_log_dir: Option<PathBuf>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(600),
            chat_log_dir: None,
        }
    }
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            chat_log_dir: std::env::var("YTSUM_CHAT_LOG_DIR").ok().map(PathBuf::from),
        }
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_metadata: Option<VideoOffsets>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoOffsets {
    start_offset: String,
    end_offset: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Conversation log written per call.
#[derive(Debug, Serialize)]
struct ChatLog<'a> {
    url: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    window: Option<&'a ChunkWindow>,
    prompt: &'a str,
    response: &'a str,
    timestamp: chrono::DateTime<Utc>,
}

/// Summary writer backed by the Gemini API.
pub struct GeminiSummaryWriter {
    api_key: String,
    config: GeminiConfig,
    client: Client,
}

impl GeminiSummaryWriter {
    /// Create a new Gemini writer.
    pub fn new(config: GeminiConfig) -> WorkerResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| WorkerError::config_error("GEMINI_API_KEY not set"))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            config,
            client,
        })
    }

    /// Build the prompt text for a request.
    fn build_prompt(&self, request: &SummaryRequest) -> String {
        let meta = &request.metadata;
        let mut prompt = format!(
            "{}\n\nVideo title: {}\nChannel: {}\n",
            request.prompt.trim(),
            meta.title,
            meta.channel.as_deref().unwrap_or("unknown"),
        );

        if let Some(window) = &request.window {
            prompt.push_str(&format!(
                "\nThis video is processed in {} parts. Summarize ONLY part {} covering {} to {}.\n",
                window.total,
                window.index,
                format_timestamp(window.start_secs),
                format_timestamp(window.end_secs),
            ));
        }

        if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
            prompt.push_str(
                "\nSUMMARY OF THE VIDEO SO FAR (do not repeat these points; continue the narrative):\n",
            );
            prompt.push_str(context);
            prompt.push('\n');
        }

        prompt.push_str("\nReturn the summary as Markdown only.\n");
        prompt
    }

    fn build_request(&self, request: &SummaryRequest, prompt: String) -> GeminiRequest {
        let video = Part {
            file_data: Some(FileData {
                file_uri: request.url.clone(),
            }),
            video_metadata: request.window.map(|w| VideoOffsets {
                start_offset: format!("{}s", w.start_secs),
                end_offset: format!("{}s", w.end_secs),
            }),
            ..Default::default()
        };
        let text = Part {
            text: Some(prompt),
            ..Default::default()
        };

        GeminiRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![video, text],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "text/plain".to_string(),
            },
        }
    }

    /// Call Gemini API.
    async fn call_gemini_api(&self, body: &GeminiRequest) -> Result<String, SummaryError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SummaryError::Timeout(e.to_string())
                } else {
                    SummaryError::generation(format!("Gemini API request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SummaryError::from_http_status(status.as_u16(), &error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            SummaryError::generation(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text: String = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(SummaryError::generation("No content in Gemini response"));
        }
        Ok(text)
    }

    /// Persist the exchange; failures are logged and do not fail the call.
    async fn write_chat_log(&self, request: &SummaryRequest, prompt: &str, response: &str) -> Option<String> {
        let dir = self.config.chat_log_dir.as_ref()?;
        let log = ChatLog {
            url: &request.url,
            model: &self.config.model,
            window: request.window.as_ref(),
            prompt,
            response,
            timestamp: Utc::now(),
        };

        let path = dir.join(format!("chat-{}.json", Uuid::new_v4()));
        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            let json = serde_json::to_vec_pretty(&log)?;
            tokio::fs::write(&path, json).await?;
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
        }
        .await;

        match result {
            Ok(()) => Some(path.display().to_string()),
            Err(e) => {
                warn!("Failed to write chat log {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl SummaryWriter for GeminiSummaryWriter {
    async fn generate(&self, request: &SummaryRequest) -> Result<SummaryOutput, SummaryError> {
        let prompt = self.build_prompt(request);
        let body = self.build_request(request, prompt.clone());

        match &request.window {
            Some(w) => info!(
                model = %self.config.model,
                "Requesting summary of part {}/{} ({})", w.index, w.total, w.span_label()
            ),
            None => info!(model = %self.config.model, "Requesting summary of {}", request.url),
        }

        let markdown = self.call_gemini_api(&body).await?;
        debug!("Gemini returned {} characters", markdown.len());

        let log_path = self.write_chat_log(request, &prompt, &markdown).await;
        Ok(SummaryOutput { markdown, log_path })
    }
}
