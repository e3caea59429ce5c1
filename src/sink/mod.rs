//! Outbound collaborators fed by the crawler
//!
//! - `ProgressSink`: receives human-readable progress during a job. Sink
//!   errors are always swallowed by the caller.
//! - `DiscoveryNotifier`: told after a flush that new files exist.
//!   Fire-and-forget; the writer never waits on the outcome.

mod notify;
mod progress;

pub use notify::{ChannelNotifier, DiscoveryEvent, DiscoveryNotifier, NoopNotifier};
pub use progress::{ProgressSink, ProgressUpdate, TracingProgress};

use thiserror::Error;

/// Errors a sink may report; callers log and continue
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink closed")]
    Closed,

    #[error("Sink storage error: {0}")]
    Storage(String),
}
