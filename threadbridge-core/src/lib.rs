// ABOUTME: Platform-agnostic dispatch core for the threadbridge chat bridge.
// ABOUTME: Dedup, thread history, prompt assembly, admission control, and the per-event dispatcher.

pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod event;
pub mod gate;
pub mod history;
pub mod metrics;
pub mod prompt;
pub mod traits;
pub mod utils;

pub use config::Config;
pub use dedup::Deduplicator;
pub use dispatcher::{Dispatcher, DispatcherConfig, Outcome, RejectReason};
pub use event::{ChannelKind, InboundEvent, ThreadKey};
pub use gate::{ConcurrencyGate, GatePermit};
pub use history::{HistoryEntry, HistoryStore, Role};
pub use prompt::Language;
pub use traits::ReplySink;

// Re-export agent types for convenience
pub use threadbridge_agent::{AssistantBackend, CodexConfig, CodexRunner, RunError};
