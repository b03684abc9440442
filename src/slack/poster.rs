// ABOUTME: ReplySink backed by Slack's chat.postMessage with thread_ts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use slack_morphism::prelude::*;
use std::sync::Arc;
use threadbridge_core::ReplySink;

/// Posts replies into the originating Slack thread
pub struct SlackReplySink {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
}

impl SlackReplySink {
    pub fn new(client: Arc<SlackHyperClient>, token: SlackApiToken) -> Self {
        Self { client, token }
    }
}

pub fn reply_request(channel: &str, thread_ts: &str, text: &str) -> SlackApiChatPostMessageRequest {
    SlackApiChatPostMessageRequest::new(
        channel.into(),
        SlackMessageContent::new().with_text(text.to_string()),
    )
    .with_thread_ts(thread_ts.into())
}

#[async_trait]
impl ReplySink for SlackReplySink {
    fn platform_id(&self) -> &'static str {
        "slack"
    }

    async fn post(&self, channel: &str, thread_ts: &str, text: &str) -> Result<()> {
        let session = self.client.open_session(&self.token);
        session
            .chat_post_message(&reply_request(channel, thread_ts, text))
            .await
            .with_context(|| format!("Failed to post Slack reply to {}", channel))?;
        Ok(())
    }
}
