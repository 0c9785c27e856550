//! Batch summarization binary.
//!
//! Reads YouTube URLs (one per line, optionally followed by a custom prompt)
//! from the file given as the first argument or from stdin, queues them and
//! waits until every one is completed or failed.

use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ytsum_models::ItemId;
use ytsum_queue::{QueueConfig, QueueManager};
use ytsum_worker::{
    GeminiSummaryWriter, JsonFileStorage, ProcessingPipeline, ProgressPrinter, WorkerConfig,
    YtDlpMetadataExtractor,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("ytsum failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("ytsum=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .with(env_filter)
            .try_init()?;
    }
    Ok(())
}

/// Returns `Ok(true)` when every item completed.
async fn run() -> anyhow::Result<bool> {
    let input = read_input(std::env::args().nth(1)).await?;
    let entries = parse_entries(&input);
    if entries.is_empty() {
        warn!("No URLs to summarize");
        return Ok(true);
    }

    let config = WorkerConfig::from_env();
    info!(
        "Worker config: model={}, window={}s, overlap={}s, retries={}, output={}",
        config.gemini.model,
        config.chunking.max_window_secs,
        config.chunking.overlap_secs,
        config.retry.max_retries,
        config.output_dir.display()
    );

    let extractor = Arc::new(YtDlpMetadataExtractor::new(
        config.ytdlp_bin.clone(),
        config.metadata_timeout,
    ));
    let writer = Arc::new(
        GeminiSummaryWriter::new(config.gemini.clone()).context("Failed to create Gemini client")?,
    );
    let storage = Arc::new(JsonFileStorage::new(config.output_dir.clone()));
    let pipeline = ProcessingPipeline::new(&config, extractor, writer, storage)
        .context("Failed to create processing pipeline")?;

    let queue = QueueManager::new(QueueConfig::from_env(), Arc::new(pipeline));
    queue.add_status_listener(Arc::new(ProgressPrinter::new()));
    let (_, mut events) = queue.subscribe();

    let mut pending: HashSet<ItemId> = HashSet::new();
    for (url, prompt) in entries {
        match queue.enqueue(url, prompt) {
            Ok(id) => {
                pending.insert(id);
            }
            Err(e) => warn!("Skipping {}: {}", url, e),
        }
    }
    queue.start();

    let mut interrupted = false;
    while !pending.is_empty() {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) if event.kind.is_terminal() => {
                    pending.remove(&event.item_id);
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, finishing current item");
                interrupted = true;
                break;
            }
        }
    }

    queue.stop().await;

    let snapshot = queue.get_status();
    for item in &snapshot.completed {
        println!("ok      {}  {}", item.url, item.title.as_deref().unwrap_or(""));
    }
    for item in &snapshot.failed {
        println!(
            "failed  {}  {}",
            item.url,
            item.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    for item in &snapshot.todo {
        println!("skipped {}", item.url);
    }
    println!(
        "{} completed, {} failed, {} not processed",
        snapshot.completed.len(),
        snapshot.failed.len(),
        snapshot.todo.len()
    );

    Ok(!interrupted && snapshot.failed.is_empty() && snapshot.todo.is_empty())
}

async fn read_input(path: Option<String>) -> anyhow::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path)),
        None => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

/// Split input into `(url, custom_prompt)` pairs, skipping blanks and `#` comments.
fn parse_entries(input: &str) -> Vec<(&str, Option<String>)> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once(char::is_whitespace) {
            Some((url, prompt)) => {
                let prompt = prompt.trim();
                (url, (!prompt.is_empty()).then(|| prompt.to_string()))
            }
            None => (line, None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries() {
        let input = "\
# talks to summarize
https://youtu.be/a

  https://youtu.be/b   Focus on the benchmarks
https://youtu.be/c\t
";
        assert_eq!(
            parse_entries(input),
            vec![
                ("https://youtu.be/a", None),
                ("https://youtu.be/b", Some("Focus on the benchmarks".to_string())),
                ("https://youtu.be/c", None),
            ]
        );
    }
}
