// ABOUTME: Assistant backend implementations.
// ABOUTME: codex spawns the real CLI; mock returns scripted replies for tests.

pub mod codex;
pub mod mock;
