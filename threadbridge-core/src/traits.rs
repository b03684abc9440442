// ABOUTME: Capability traits the dispatcher needs from the chat platform.
// ABOUTME: Keeps the core independent of any particular transport SDK.

use anyhow::Result;
use async_trait::async_trait;

/// Posts a reply into a conversation thread
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Platform name for logging
    fn platform_id(&self) -> &'static str;

    /// Post `text` as a threaded reply under `thread_ts` in `channel`
    async fn post(&self, channel: &str, thread_ts: &str, text: &str) -> Result<()>;
}
