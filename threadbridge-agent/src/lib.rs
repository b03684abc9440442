// ABOUTME: External assistant abstraction for threadbridge.
// ABOUTME: Provides the AssistantBackend trait, the codex exec runner, and a mock for tests.

pub mod backends;
pub mod error;
pub mod scratch;
pub mod traits;

pub use backends::codex::{CodexConfig, CodexRunner};
pub use backends::mock::{MockBackend, MockReply};
pub use error::RunError;
pub use scratch::ScratchFile;
pub use traits::AssistantBackend;
