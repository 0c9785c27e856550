//! Queue configuration.

/// Queue configuration.
#[derive(Debug, Clone, Default)]
pub struct QueueConfig {
    /// Maximum number of items waiting in `todo` (unbounded when `None`)
    pub max_queue_size: Option<usize>,
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_queue_size: std::env::var("QUEUE_MAX_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0),
        }
    }

    /// Set the maximum number of waiting items.
    pub fn with_max_queue_size(mut self, max: usize) -> Self {
        self.max_queue_size = Some(max);
        self
    }
}
