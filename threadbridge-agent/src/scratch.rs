// ABOUTME: Scoped temporary file path used as the assistant's output artifact.
// ABOUTME: The file is never pre-created and is removed when the guard drops.

use std::path::{Path, PathBuf};

/// A uniquely named path in a scratch directory that is deleted on drop.
///
/// Holding the guard for the whole invocation means the artifact is removed
/// on every exit path: success, error, timeout or panic.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserve a fresh name in the system temp directory
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Self::in_dir(&std::env::temp_dir(), prefix, suffix)
    }

    /// Reserve a fresh name inside `dir`
    pub fn in_dir(dir: &Path, prefix: &str, suffix: &str) -> Self {
        let name = format!("{}{}{}", prefix, uuid::Uuid::new_v4().simple(), suffix);
        Self {
            path: dir.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the artifact as UTF-8 text. A missing or unreadable file reads as empty.
    pub async fn read_text(&self) -> String {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read output artifact");
                String::new()
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove output artifact");
            }
        }
    }
}
