//! Chunk planning for long videos.
//!
//! A video longer than `max_window_secs` is split into `ceil(D / W)`
//! windows. Consecutive windows overlap by `overlap_secs` so content at a cut
//! is seen twice; the last window always runs to the end of the video.
//!
//! ```text
//! D = 5400, W = 2700, O = 300
//! [0 ........ 2700]
//!          [2400 ............ 5400]
//! ```

use serde::Serialize;
use tracing::warn;

use crate::error::{WorkerError, WorkerResult};

/// Chunking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Longest duration summarized in one call (seconds)
    pub max_window_secs: u64,
    /// Overlap between consecutive windows (seconds)
    pub overlap_secs: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_window_secs: 45 * 60,
            overlap_secs: 5 * 60,
        }
    }
}

impl ChunkingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_window_secs: std::env::var("CHUNK_MAX_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_window_secs),
            overlap_secs: std::env::var("CHUNK_OVERLAP_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.overlap_secs),
        }
    }
}

/// One time window of a chunked video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkWindow {
    pub start_secs: u64,
    pub end_secs: u64,
    /// 1-based position in the plan
    pub index: u32,
    pub total: u32,
}

impl ChunkWindow {
    pub fn duration_secs(&self) -> u64 {
        self.end_secs - self.start_secs
    }

    pub fn is_first(&self) -> bool {
        self.index == 1
    }

    pub fn is_last(&self) -> bool {
        self.index == self.total
    }

    /// `HH:MM:SS-HH:MM:SS` span, for prompts and logs.
    pub fn span_label(&self) -> String {
        format!(
            "{}-{}",
            format_timestamp(self.start_secs),
            format_timestamp(self.end_secs)
        )
    }
}

/// Result of planning a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkPlan {
    /// Summarize the whole video in one call.
    Single,
    /// Summarize window by window, in order.
    Chunked(Vec<ChunkWindow>),
}

impl ChunkPlan {
    pub fn is_chunked(&self) -> bool {
        matches!(self, ChunkPlan::Chunked(_))
    }

    /// Number of summary calls the plan needs.
    pub fn summary_calls(&self) -> u32 {
        match self {
            ChunkPlan::Single => 1,
            ChunkPlan::Chunked(windows) => windows.last().map_or(1, |w| w.total),
        }
    }

    pub fn windows(&self) -> &[ChunkWindow] {
        match self {
            ChunkPlan::Single => &[],
            ChunkPlan::Chunked(windows) => windows,
        }
    }
}

/// Decides whether and how to split a video into windows.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanner {
    config: ChunkingConfig,
}

impl ChunkPlanner {
    pub fn new(config: ChunkingConfig) -> WorkerResult<Self> {
        if config.max_window_secs == 0 {
            return Err(WorkerError::config_error("chunk window must be longer than 0s"));
        }
        if config.overlap_secs >= config.max_window_secs {
            return Err(WorkerError::config_error(format!(
                "chunk overlap ({}s) must be shorter than the window ({}s)",
                config.overlap_secs, config.max_window_secs
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Plan a video of the given duration.
    ///
    /// An unknown duration, or one that fits in a single window (inclusive),
    /// is not chunked. A duration needing more than `u32::MAX` windows is
    /// not chunked either.
    pub fn plan(&self, duration_secs: Option<u64>) -> ChunkPlan {
        let Some(duration) = duration_secs else {
            return ChunkPlan::Single;
        };
        let window = self.config.max_window_secs;
        if duration <= window {
            return ChunkPlan::Single;
        }

        let Ok(total) = u32::try_from(duration.div_ceil(window)) else {
            warn!(duration_secs = duration, "Duration needs too many windows, not chunking");
            return ChunkPlan::Single;
        };
        let stride = window - self.config.overlap_secs;
        let windows = (1..=total)
            .map(|index| {
                let start = (u64::from(index - 1) * stride).min(duration);
                let end = if index == total {
                    duration
                } else {
                    start.saturating_add(window).min(duration)
                };
                ChunkWindow {
                    start_secs: start,
                    end_secs: end,
                    index,
                    total,
                }
            })
            .collect();

        ChunkPlan::Chunked(windows)
    }
}

/// Running summary built from consecutive windows.
///
/// The context passed to the next window is the distilled text of all prior
/// windows, without any window boundaries.
#[derive(Debug, Clone, Default)]
pub struct SummaryAccumulator {
    parts: Vec<String>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one window's output. Blank output is skipped.
    pub fn push(&mut self, part: &str) {
        let part = part.trim();
        if !part.is_empty() {
            self.parts.push(part.to_string());
        }
    }

    /// Summary so far, or `None` before the first non-empty part.
    pub fn context(&self) -> Option<String> {
        if self.parts.is_empty() {
            None
        } else {
            Some(self.parts.join("\n\n"))
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn into_summary(self) -> String {
        self.parts.join("\n\n")
    }
}

/// Format seconds as `HH:MM:SS`.
pub fn format_timestamp(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(window: u64, overlap: u64) -> ChunkPlanner {
        ChunkPlanner::new(ChunkingConfig {
            max_window_secs: window,
            overlap_secs: overlap,
        })
        .unwrap()
    }

    fn spans(plan: &ChunkPlan) -> Vec<(u64, u64)> {
        plan.windows().iter().map(|w| (w.start_secs, w.end_secs)).collect()
    }

    #[test]
    fn test_ninety_minutes_makes_two_windows() {
        let plan = planner(2700, 300).plan(Some(5400));
        assert!(plan.is_chunked());
        assert_eq!(spans(&plan), vec![(0, 2700), (2400, 5400)]);

        let windows = plan.windows();
        assert_eq!((windows[0].index, windows[0].total), (1, 2));
        assert_eq!((windows[1].index, windows[1].total), (2, 2));
        assert!(windows[0].is_first() && windows[1].is_last());
    }

    #[test]
    fn test_exactly_one_window_is_not_chunked() {
        let plan = planner(2700, 300).plan(Some(2700));
        assert_eq!(plan, ChunkPlan::Single);
        assert_eq!(plan.summary_calls(), 1);
    }

    #[test]
    fn test_short_and_unknown_durations_are_not_chunked() {
        let p = planner(2700, 300);
        assert_eq!(p.plan(Some(60)), ChunkPlan::Single);
        assert_eq!(p.plan(Some(0)), ChunkPlan::Single);
        assert_eq!(p.plan(None), ChunkPlan::Single);
    }

    #[test]
    fn test_just_over_threshold() {
        let plan = planner(2700, 300).plan(Some(2701));
        assert_eq!(spans(&plan), vec![(0, 2700), (2400, 2701)]);
    }

    #[test]
    fn test_three_windows_overlap_and_cover() {
        let plan = planner(2700, 300).plan(Some(8000));
        assert_eq!(spans(&plan), vec![(0, 2700), (2400, 5100), (4800, 8000)]);
        assert_eq!(plan.summary_calls(), 3);
    }

    #[test]
    fn test_window_count_beyond_u32_is_not_chunked() {
        let plan = planner(1, 0).plan(Some(u64::from(u32::MAX) + 1));
        assert_eq!(plan, ChunkPlan::Single);
        assert_eq!(plan.summary_calls(), 1);
    }

    #[test]
    fn test_huge_duration_does_not_overflow() {
        let window = u64::MAX / 2;
        let plan = planner(window, 10).plan(Some(u64::MAX));
        let windows = plan.windows();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].end_secs, u64::MAX);
        assert!(windows.iter().all(|w| w.start_secs <= w.end_secs));
    }

    #[test]
    fn test_windows_cover_whole_video() {
        let p = planner(2700, 300);
        for duration in [2701, 4000, 5399, 5400, 5401, 9000, 12_345, 36_000] {
            let plan = p.plan(Some(duration));
            let windows = plan.windows();
            assert_eq!(windows.len() as u64, duration.div_ceil(2700));
            assert_eq!(windows[0].start_secs, 0);
            assert_eq!(windows.last().unwrap().end_secs, duration);
            for pair in windows.windows(2) {
                // Each window starts before the previous one ends
                assert!(pair[1].start_secs < pair[0].end_secs, "gap at {}s", duration);
                assert_eq!(pair[0].end_secs - pair[1].start_secs, 300);
            }
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ChunkPlanner::new(ChunkingConfig {
            max_window_secs: 0,
            overlap_secs: 0
        })
        .is_err());
        assert!(ChunkPlanner::new(ChunkingConfig {
            max_window_secs: 300,
            overlap_secs: 300
        })
        .is_err());
    }

    #[test]
    fn test_accumulator_context() {
        let mut acc = SummaryAccumulator::new();
        assert_eq!(acc.context(), None);

        acc.push("  First part.  ");
        assert_eq!(acc.context().as_deref(), Some("First part."));

        acc.push("");
        acc.push("Second part.");
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.context().as_deref(), Some("First part.\n\nSecond part."));
        assert_eq!(acc.into_summary(), "First part.\n\nSecond part.");
    }

    #[test]
    fn test_span_label() {
        let window = ChunkWindow {
            start_secs: 2400,
            end_secs: 5400,
            index: 2,
            total: 2,
        };
        assert_eq!(window.span_label(), "00:40:00-01:30:00");
        assert_eq!(window.duration_secs(), 3000);
    }
}
