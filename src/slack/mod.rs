// ABOUTME: Slack Socket Mode transport that turns push events into InboundEvents.
// ABOUTME: Resolves the bot identity via auth.test and exposes a threaded reply sink.

pub mod poster;

pub use poster::{reply_request, SlackReplySink};

use anyhow::{Context, Result};
use slack_morphism::prelude::*;
use std::sync::Arc;
use threadbridge_core::{ChannelKind, InboundEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// =============================================================================
// Shared state passed to Socket Mode callbacks via SlackClientEventsUserState
// =============================================================================

/// Callbacks are fn pointers, so the event sender travels through the
/// listener's user state instead of a closure capture.
#[derive(Clone)]
struct ListenerState {
    tx: Arc<mpsc::Sender<InboundEvent>>,
}

async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = {
        let guard = states.read().await;
        guard
            .get_user_state::<ListenerState>()
            .cloned()
            .ok_or("ListenerState not found in user state")?
    };

    let event_id = event.event_id.to_string();
    let Some(inbound) = inbound_from_body(&event_id, &event.event) else {
        tracing::trace!(event_id = %event_id, "Ignoring unsupported push event");
        return Ok(());
    };

    if state.tx.send(inbound).await.is_err() {
        tracing::warn!(platform = "slack", "Event receiver dropped");
    }
    Ok(())
}

fn socket_mode_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::error!(platform = "slack", error = %err, "Socket Mode error");
    HttpStatusCode::OK
}

// =============================================================================
// Event translation
// =============================================================================

/// Translate a push event body. Only `message` and `app_mention` carry
/// anything the dispatcher can use; everything else yields `None`.
pub fn inbound_from_body(event_id: &str, body: &SlackEventCallbackBody) -> Option<InboundEvent> {
    match body {
        SlackEventCallbackBody::Message(msg) => Some(inbound_from_message(event_id, msg)),
        SlackEventCallbackBody::AppMention(mention) => Some(inbound_from_mention(event_id, mention)),
        _ => None,
    }
}

fn inbound_from_message(event_id: &str, msg: &SlackMessageEvent) -> InboundEvent {
    InboundEvent {
        event_id: event_id.to_string(),
        event_type: "message".to_string(),
        subtype: msg.subtype.as_ref().map(|s| format!("{:?}", s)),
        channel: msg
            .origin
            .channel
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default(),
        channel_kind: channel_kind(&msg.origin),
        user: msg.sender.user.as_ref().map(|u| u.to_string()),
        bot_id: msg.sender.bot_id.as_ref().map(|b| b.to_string()),
        text: msg
            .content
            .as_ref()
            .and_then(|c| c.text.clone())
            .unwrap_or_default(),
        ts: msg.origin.ts.to_string(),
        thread_ts: msg.origin.thread_ts.as_ref().map(|ts| ts.to_string()),
    }
}

fn inbound_from_mention(event_id: &str, mention: &SlackAppMentionEvent) -> InboundEvent {
    InboundEvent {
        event_id: event_id.to_string(),
        event_type: "app_mention".to_string(),
        subtype: None,
        channel: mention.channel.to_string(),
        channel_kind: channel_kind(&mention.origin),
        user: Some(mention.user.to_string()),
        bot_id: None,
        text: mention.content.text.clone().unwrap_or_default(),
        ts: mention.origin.ts.to_string(),
        thread_ts: mention.origin.thread_ts.as_ref().map(|ts| ts.to_string()),
    }
}

fn channel_kind(origin: &SlackMessageOrigin) -> ChannelKind {
    let channel_type = origin.channel_type.as_ref().map(|t| t.to_string());
    ChannelKind::from_slack(channel_type.as_deref())
}

// =============================================================================
// SlackConnection
// =============================================================================

/// Authenticated Slack client plus the tokens needed for Socket Mode and posting
pub struct SlackConnection {
    client: Arc<SlackHyperClient>,
    bot_token: SlackApiToken,
    app_token: SlackApiToken,
    bot_user_id: String,
}

impl SlackConnection {
    /// Build the HTTP client and resolve the bot's user ID via `auth.test`
    pub async fn connect(app_token: &str, bot_token: &str) -> Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("Failed to create Slack HTTP connector")?,
        ));

        let bot_token = SlackApiToken::new(SlackApiTokenValue(bot_token.to_string()));
        let app_token = SlackApiToken::new(SlackApiTokenValue(app_token.to_string()));

        let session = client.open_session(&bot_token);
        let auth = session
            .auth_test()
            .await
            .context("Failed to call Slack auth.test, check bot_token")?;
        let bot_user_id = auth.user_id.to_string();

        tracing::info!(bot_user = %bot_user_id, team = %auth.team, "Slack bot authenticated");

        Ok(Self {
            client,
            bot_token,
            app_token,
            bot_user_id,
        })
    }

    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    pub fn reply_sink(&self) -> SlackReplySink {
        SlackReplySink::new(Arc::clone(&self.client), self.bot_token.clone())
    }

    /// Start the Socket Mode listener on its own task. Translated events are
    /// sent on `tx`; the task ends when the listener stops serving.
    pub fn listen(&self, tx: mpsc::Sender<InboundEvent>) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let app_token = self.app_token.clone();
        let state = ListenerState { tx: Arc::new(tx) };

        tokio::spawn(async move {
            let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

            let environment = Arc::new(
                SlackClientEventsListenerEnvironment::new(client)
                    .with_error_handler(socket_mode_error_handler)
                    .with_user_state(state),
            );

            let listener = SlackClientSocketModeListener::new(
                &SlackClientSocketModeConfig::new(),
                environment,
                callbacks,
            );

            match listener.listen_for(&app_token).await {
                Ok(_) => {
                    tracing::info!(platform = "slack", "Socket Mode connected");
                    listener.serve().await;
                    tracing::info!(platform = "slack", "Socket Mode listener stopped");
                }
                Err(e) => {
                    tracing::error!(
                        platform = "slack",
                        error = %e,
                        "Failed to start Socket Mode listener"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SlackConnection>();
        assert_send_sync::<SlackReplySink>();
    }

    #[test]
    fn test_unknown_channel_type_is_other() {
        let origin = SlackMessageOrigin::new("1.0".into());
        assert_eq!(channel_kind(&origin), ChannelKind::Other);
    }
}
