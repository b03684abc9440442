// ABOUTME: Core AssistantBackend trait that every assistant runner implements.
// ABOUTME: One call is one independent, stateless invocation of the assistant.

use crate::RunError;
use async_trait::async_trait;

/// A capability that turns a prompt into the assistant's final reply.
///
/// Implementations must be safe to call from many tasks at once; callers
/// bound concurrency themselves.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Backend name for logging and metrics
    fn name(&self) -> &'static str;

    /// Run the assistant once and return its trimmed, non-empty reply
    async fn run(&self, prompt: &str) -> Result<String, RunError>;
}
