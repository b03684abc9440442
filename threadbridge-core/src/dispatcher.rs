// ABOUTME: Per-event dispatch pipeline from inbound chat event to threaded reply.
// ABOUTME: Filters, normalizes, records history, gates the assistant run, and posts the result.

use crate::{
    dedup::Deduplicator,
    event::{InboundEvent, ThreadKey},
    gate::ConcurrencyGate,
    history::{HistoryStore, Role},
    metrics,
    prompt::{build_prompt, Language},
    traits::ReplySink,
    utils::{collapse_whitespace, truncate_chars, MAX_REPLY_CHARS},
};
use std::collections::HashSet;
use std::sync::Arc;
use threadbridge_agent::{AssistantBackend, RunError};
use tokio::task::JoinHandle;

/// Policy knobs for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// The bridge's own user ID; its messages are ignored and `<@id>` is its mention token
    pub bot_user_id: String,
    /// Outside direct conversations, require a mention before answering
    pub mention_only: bool,
    /// Channels to serve (empty = all). Direct conversations are always served.
    pub allowed_channels: HashSet<String>,
    pub max_reply_chars: usize,
}

impl DispatcherConfig {
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            mention_only: true,
            allowed_channels: HashSet::new(),
            max_reply_chars: MAX_REPLY_CHARS,
        }
    }

    fn mention_token(&self) -> String {
        format!("<@{}>", self.bot_user_id)
    }
}

/// Why an event was dropped without a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Edits, deletions and other sub-typed messages
    Subtype,
    /// Posted by an automated actor
    Bot,
    MissingAuthor,
    /// Posted by the bridge itself
    SelfOrigin,
    ChannelNotAllowed,
    NoThread,
    /// Nothing left to answer after normalization (or no mention in mention-only mode)
    EmptyText,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subtype => "subtype",
            Self::Bot => "bot",
            Self::MissingAuthor => "missing_author",
            Self::SelfOrigin => "self",
            Self::ChannelNotAllowed => "channel_not_allowed",
            Self::NoThread => "no_thread",
            Self::EmptyText => "empty_text",
        }
    }
}

/// Terminal state of one processed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Rejected(RejectReason),
    /// A reply was posted; `ok` is false when it carried a failure banner
    Replied { ok: bool },
    /// The reply could not be posted; nothing further was recorded
    PostFailed,
}

/// An event that passed every filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub key: ThreadKey,
    pub text: String,
}

pub struct Dispatcher {
    config: DispatcherConfig,
    dedup: Deduplicator,
    gate: ConcurrencyGate,
    history: Arc<HistoryStore>,
    backend: Arc<dyn AssistantBackend>,
    sink: Arc<dyn ReplySink>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        history: Arc<HistoryStore>,
        gate: ConcurrencyGate,
        backend: Arc<dyn AssistantBackend>,
        sink: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            config,
            dedup: Deduplicator::new(),
            gate,
            history,
            backend,
            sink,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Entry point for the transport. Duplicates and non-message events are
    /// dropped here; everything else is processed on its own task.
    pub fn dispatch(self: &Arc<Self>, event: InboundEvent) -> Option<JoinHandle<Outcome>> {
        metrics::record_event_received();

        if self.dedup.seen(event.event_id.trim()) {
            tracing::debug!(event_id = %event.event_id, "Skipping duplicate event");
            metrics::record_event_duplicate();
            return None;
        }
        if !event.is_dispatchable_type() {
            tracing::trace!(event_type = %event.event_type, "Ignoring non-message event");
            return None;
        }

        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.process(event).await }))
    }

    /// Run the full pipeline for one event
    pub async fn process(&self, event: InboundEvent) -> Outcome {
        let Accepted { key, text } = match self.accept(&event) {
            Ok(accepted) => accepted,
            Err(reason) => {
                tracing::debug!(
                    channel = %event.channel,
                    reason = reason.as_str(),
                    "Event rejected"
                );
                metrics::record_event_rejected(reason.as_str());
                return Outcome::Rejected(reason);
            }
        };

        tracing::info!(
            channel = %key.channel,
            thread = %key.thread_ts,
            text_len = text.len(),
            "Accepted message"
        );

        let rows = self.history.snapshot(&key);
        let prompt = build_prompt(&rows, &text, self.history.max_messages());
        self.record(&key, Role::User, &text);

        let started = std::time::Instant::now();
        let result = {
            let _permit = self.gate.acquire().await;
            self.backend.run(&prompt).await
        };
        let elapsed = started.elapsed();
        metrics::record_assistant_run(
            result.as_ref().map(|_| "ok").unwrap_or_else(|e| e.kind()),
            elapsed.as_secs_f64(),
        );

        let reply = match &result {
            Ok(reply) => reply.clone(),
            Err(e) => {
                tracing::warn!(
                    channel = %key.channel,
                    thread = %key.thread_ts,
                    backend = self.backend.name(),
                    error = %e,
                    "Assistant run failed"
                );
                failure_reply(Language::detect(&text), e)
            }
        };

        let posted = truncate_chars(&reply, self.config.max_reply_chars);
        if let Err(e) = self.sink.post(&key.channel, &key.thread_ts, posted).await {
            tracing::error!(
                platform = self.sink.platform_id(),
                channel = %key.channel,
                thread = %key.thread_ts,
                error = %e,
                "Failed to post reply"
            );
            metrics::record_post_failure();
            return Outcome::PostFailed;
        }
        metrics::record_reply_posted();

        tracing::info!(
            channel = %key.channel,
            thread = %key.thread_ts,
            ok = result.is_ok(),
            reply_len = posted.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Reply posted"
        );

        match result {
            Ok(reply) => {
                self.record(&key, Role::Assistant, &reply);
                Outcome::Replied { ok: true }
            }
            Err(_) => Outcome::Replied { ok: false },
        }
    }

    /// Apply the filters in order and normalize the text
    pub fn accept(&self, event: &InboundEvent) -> Result<Accepted, RejectReason> {
        if is_present(event.subtype.as_deref()) {
            return Err(RejectReason::Subtype);
        }
        if is_present(event.bot_id.as_deref()) {
            return Err(RejectReason::Bot);
        }
        let user = event.user.as_deref().map(str::trim).unwrap_or_default();
        if user.is_empty() {
            return Err(RejectReason::MissingAuthor);
        }
        if user == self.config.bot_user_id {
            return Err(RejectReason::SelfOrigin);
        }
        if !self.is_channel_allowed(event) {
            return Err(RejectReason::ChannelNotAllowed);
        }
        let key = event.thread_key().ok_or(RejectReason::NoThread)?;
        let text = self.normalize_text(&event.text, event.channel_kind.is_direct());
        if text.is_empty() {
            return Err(RejectReason::EmptyText);
        }
        Ok(Accepted { key, text })
    }

    pub fn is_channel_allowed(&self, event: &InboundEvent) -> bool {
        let channel = event.channel.trim();
        if channel.is_empty() {
            return false;
        }
        if event.channel_kind.is_direct() {
            return true;
        }
        self.config.allowed_channels.is_empty() || self.config.allowed_channels.contains(channel)
    }

    /// Trim and collapse whitespace. In mention-only mode outside direct
    /// conversations the mention token is required and stripped; elsewhere
    /// the text is kept as written. Empty means "drop".
    pub fn normalize_text(&self, raw: &str, is_direct: bool) -> String {
        let text = raw.trim();
        if text.is_empty() {
            return String::new();
        }
        if !self.config.mention_only || is_direct {
            return collapse_whitespace(text);
        }
        let mention = self.config.mention_token();
        if !text.contains(&mention) {
            return String::new();
        }
        collapse_whitespace(&text.replace(&mention, " "))
    }

    fn record(&self, key: &ThreadKey, role: Role, text: &str) {
        if let Err(e) = self.history.append(key, role, text) {
            tracing::warn!(
                thread = %key,
                role = role.as_str(),
                error = %e,
                "Failed to persist history"
            );
        }
    }
}

fn is_present(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Banner line followed by a short diagnostic, in the user's language
pub fn failure_reply(lang: Language, error: &RunError) -> String {
    format!("{}\n{}", lang.failure_banner(), lang.describe_failure(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChannelKind;
    use anyhow::Result;
    use async_trait::async_trait;
    use threadbridge_agent::MockBackend;

    struct NullSink;

    #[async_trait]
    impl ReplySink for NullSink {
        fn platform_id(&self) -> &'static str {
            "null"
        }

        async fn post(&self, _channel: &str, _thread_ts: &str, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn dispatcher(config: DispatcherConfig) -> (Dispatcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let history = Arc::new(HistoryStore::open(dir.path().join("state.json"), 6));
        let dispatcher = Dispatcher::new(
            config,
            history,
            ConcurrencyGate::default(),
            Arc::new(MockBackend::new()),
            Arc::new(NullSink),
        );
        (dispatcher, dir)
    }

    #[test]
    fn test_mention_stripped_in_channel_with_mention_only() {
        let (d, _dir) = dispatcher(DispatcherConfig::new("BOTID"));
        assert_eq!(d.normalize_text("<@BOTID> hello", false), "hello");
    }

    #[test]
    fn test_channel_without_mention_is_dropped() {
        let (d, _dir) = dispatcher(DispatcherConfig::new("BOTID"));
        assert_eq!(d.normalize_text("hello there", false), "");
        assert_eq!(d.normalize_text("<@OTHER> hello", false), "");
    }

    #[test]
    fn test_direct_message_skips_mention_requirement() {
        let (d, _dir) = dispatcher(DispatcherConfig::new("BOTID"));
        assert_eq!(d.normalize_text("  hello   there ", true), "hello there");
        assert_eq!(d.normalize_text("<@BOTID> hello", true), "<@BOTID> hello");
        assert_eq!(d.normalize_text("<@BOTID>   hello", true), "<@BOTID> hello");
        assert_eq!(d.normalize_text("<@BOTID>", true), "<@BOTID>");
    }

    #[test]
    fn test_mention_only_disabled_keeps_plain_text() {
        let mut config = DispatcherConfig::new("BOTID");
        config.mention_only = false;
        let (d, _dir) = dispatcher(config);
        assert_eq!(d.normalize_text("just\n\ntalking", false), "just talking");
        assert_eq!(d.normalize_text("hey <@BOTID>\tthanks", false), "hey <@BOTID> thanks");
    }

    #[test]
    fn test_mention_only_message_is_empty_after_strip() {
        let (d, _dir) = dispatcher(DispatcherConfig::new("BOTID"));
        assert_eq!(d.normalize_text("<@BOTID>", false), "");
    }

    #[test]
    fn test_filter_order() {
        let (d, _dir) = dispatcher(DispatcherConfig::new("BOTID"));
        let base = InboundEvent::message("Ev1", "C1", ChannelKind::Other, "U1", "<@BOTID> hi", "1.0");

        let mut edited = base.clone();
        edited.subtype = Some("message_changed".to_string());
        edited.bot_id = Some("B1".to_string());
        assert_eq!(d.accept(&edited), Err(RejectReason::Subtype));

        let mut bot = base.clone();
        bot.bot_id = Some("B1".to_string());
        assert_eq!(d.accept(&bot), Err(RejectReason::Bot));

        let mut anonymous = base.clone();
        anonymous.user = None;
        assert_eq!(d.accept(&anonymous), Err(RejectReason::MissingAuthor));

        let mut own = base.clone();
        own.user = Some("BOTID".to_string());
        assert_eq!(d.accept(&own), Err(RejectReason::SelfOrigin));

        let mut no_ts = base.clone();
        no_ts.ts = String::new();
        assert_eq!(d.accept(&no_ts), Err(RejectReason::NoThread));

        let accepted = d.accept(&base).unwrap();
        assert_eq!(accepted.text, "hi");
        assert_eq!(accepted.key, ThreadKey::new("C1", "1.0"));
    }

    #[test]
    fn test_blank_subtype_is_not_a_marker() {
        let (d, _dir) = dispatcher(DispatcherConfig::new("BOTID"));
        let mut event = InboundEvent::message("Ev1", "D1", ChannelKind::Direct, "U1", "hi", "1.0");
        event.subtype = Some("  ".to_string());
        assert!(d.accept(&event).is_ok());
    }

    #[test]
    fn test_channel_allow_list() {
        let mut config = DispatcherConfig::new("BOTID");
        config.allowed_channels = ["C1".to_string()].into_iter().collect();
        let (d, _dir) = dispatcher(config);

        let allowed = InboundEvent::message("a", "C1", ChannelKind::Other, "U1", "x", "1.0");
        let blocked = InboundEvent::message("b", "C2", ChannelKind::Other, "U1", "x", "1.0");
        let dm = InboundEvent::message("c", "D9", ChannelKind::Direct, "U1", "x", "1.0");
        let group = InboundEvent::message("d", "G9", ChannelKind::MultiPartyDirect, "U1", "x", "1.0");
        let nameless = InboundEvent::message("e", " ", ChannelKind::Direct, "U1", "x", "1.0");

        assert!(d.is_channel_allowed(&allowed));
        assert!(!d.is_channel_allowed(&blocked));
        assert!(d.is_channel_allowed(&dm));
        assert!(d.is_channel_allowed(&group));
        assert!(!d.is_channel_allowed(&nameless));
    }

    #[test]
    fn test_empty_allow_list_allows_all() {
        let (d, _dir) = dispatcher(DispatcherConfig::new("BOTID"));
        let event = InboundEvent::message("a", "C42", ChannelKind::Other, "U1", "x", "1.0");
        assert!(d.is_channel_allowed(&event));
    }

    #[test]
    fn test_failure_reply_layout() {
        let reply = failure_reply(Language::Korean, &RunError::EmptyResponse);
        assert_eq!(reply, "처리 중 오류가 발생했습니다.\n응답이 비어 있습니다. 다시 시도해 주세요.");
    }
}
