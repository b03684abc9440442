// ABOUTME: Mock backend for testing - returns pre-configured replies.
// ABOUTME: Records prompts and tracks how many runs overlap, without spawning processes.
//!
//! # Example
//!
//! ```
//! use threadbridge_agent::{AssistantBackend, MockBackend, MockReply};
//!
//! # async fn example() {
//! let mock = MockBackend::new()
//!     .then(MockReply::Text("Hi there!".to_string()))
//!     .then(MockReply::Empty);
//!
//! assert_eq!(mock.run("hello").await.unwrap(), "Hi there!");
//! assert!(mock.run("again").await.is_err());
//! assert_eq!(mock.prompts().len(), 2);
//! # }
//! ```

use crate::error::RunError;
use crate::traits::AssistantBackend;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A scripted outcome for one mock run
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Timeout,
    Launch(String),
    Exit { code: i32, message: String },
    Empty,
}

impl MockReply {
    fn into_result(self) -> Result<String, RunError> {
        match self {
            Self::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Err(RunError::EmptyResponse)
                } else {
                    Ok(trimmed.to_string())
                }
            }
            Self::Timeout => Err(RunError::Timeout(Duration::from_secs(30))),
            Self::Launch(reason) => Err(RunError::Launch(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                reason,
            ))),
            Self::Exit { code, message } => Err(RunError::Exit {
                code: Some(code),
                message,
            }),
            Self::Empty => Err(RunError::EmptyResponse),
        }
    }
}

/// Mock backend for testing
///
/// Scripted replies are consumed in order; once exhausted every run echoes
/// a fixed `"ok"` reply.
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next scripted reply
    pub fn then(self, reply: MockReply) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    /// Hold every run open for `delay` before replying
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Highest number of runs observed executing at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssistantBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, prompt: &str) -> Result<String, RunError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| MockReply::Text("ok".to_string()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply.into_result()
    }
}
