// ABOUTME: Failure taxonomy for a single assistant invocation.
// ABOUTME: Every variant is shown to the chat user; none are retried automatically.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    /// The process outlived its wall-clock budget and was killed
    #[error("assistant timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The process could not be started (or waited on)
    #[error("failed to launch assistant: {0}")]
    Launch(#[source] std::io::Error),

    /// The process exited unsuccessfully. `message` is the last non-empty
    /// line of its output, or a generic exit-code description.
    #[error("{message}")]
    Exit { code: Option<i32>, message: String },

    /// The process exited zero but left no answer behind
    #[error("assistant returned an empty response")]
    EmptyResponse,
}

impl RunError {
    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Launch(_) => "launch",
            Self::Exit { .. } => "exit",
            Self::EmptyResponse => "empty",
        }
    }
}
