//! In-process job queue for video summarization.
//!
//! This crate provides:
//! - Thread-safe enqueue and inspection of queue items
//! - A single background worker that processes items in FIFO order
//! - Status-change notification to registered listeners
//! - Graceful shutdown that lets the running item finish

pub mod config;
pub mod error;
pub mod listener;
pub mod manager;
pub mod runner;

pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use listener::{ChannelListener, ListenerId, ListenerResult, StatusListener};
pub use manager::QueueManager;
pub use runner::{JobRunner, UpdateSink};
