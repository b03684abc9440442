// ABOUTME: Root library for the threadbridge binary: CLI arguments and Slack glue.
// ABOUTME: The dispatch pipeline itself lives in threadbridge-core.

pub mod cli;
pub mod slack;

// Re-export core and agent types for convenience
pub use threadbridge_agent::{AssistantBackend, CodexRunner};
pub use threadbridge_core::{Config, Dispatcher, InboundEvent};
