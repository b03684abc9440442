// ABOUTME: Inbound chat event records and the thread key derived from them.
// ABOUTME: Events are immutable once built by the transport layer.

use std::fmt;

/// Kind of conversation a message was posted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// 1:1 direct message (`im`)
    Direct,
    /// Group direct message (`mpim`)
    MultiPartyDirect,
    /// Public or private channel
    Other,
}

impl ChannelKind {
    /// Map a Slack `channel_type` string
    pub fn from_slack(channel_type: Option<&str>) -> Self {
        match channel_type.map(str::trim) {
            Some("im") => Self::Direct,
            Some("mpim") => Self::MultiPartyDirect,
            _ => Self::Other,
        }
    }

    pub fn is_direct(self) -> bool {
        matches!(self, Self::Direct | Self::MultiPartyDirect)
    }
}

/// One event delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Envelope-level identifier used for deduplication (may be empty)
    pub event_id: String,
    /// Event type, e.g. "message" or "app_mention"
    pub event_type: String,
    /// Sub-type marker (edits, deletions, joins, ...)
    pub subtype: Option<String>,
    pub channel: String,
    pub channel_kind: ChannelKind,
    pub user: Option<String>,
    /// Set when the message was posted by an automated actor
    pub bot_id: Option<String>,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

impl InboundEvent {
    /// Build a plain user message; handy for transports and tests
    pub fn message(
        event_id: impl Into<String>,
        channel: impl Into<String>,
        channel_kind: ChannelKind,
        user: impl Into<String>,
        text: impl Into<String>,
        ts: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: "message".to_string(),
            subtype: None,
            channel: channel.into(),
            channel_kind,
            user: Some(user.into()),
            bot_id: None,
            text: text.into(),
            ts: ts.into(),
            thread_ts: None,
        }
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    /// Only these event types carry user messages
    pub fn is_dispatchable_type(&self) -> bool {
        matches!(self.event_type.trim(), "message" | "app_mention")
    }

    /// Thread the reply belongs to: the parent thread, else the message itself
    pub fn thread_ts(&self) -> Option<&str> {
        [self.thread_ts.as_deref(), Some(self.ts.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|ts| !ts.is_empty())
    }

    pub fn thread_key(&self) -> Option<ThreadKey> {
        let thread_ts = self.thread_ts()?;
        Some(ThreadKey::new(self.channel.trim(), thread_ts))
    }
}

/// Identifies one conversation thread: `(channel, thread_ts)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadKey {
    pub channel: String,
    pub thread_ts: String,
}

impl ThreadKey {
    pub fn new(channel: impl Into<String>, thread_ts: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            thread_ts: thread_ts.into(),
        }
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.thread_ts)
    }
}
