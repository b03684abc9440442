// ABOUTME: Thread-keyed conversation history persisted as a JSON snapshot file.
// ABOUTME: Every append rewrites the full snapshot under the same lock as the in-memory map.

use crate::event::ThreadKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Parse a stored role; anything other than `user`/`assistant` is rejected
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One recorded turn. `text` is always trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

impl HistoryEntry {
    /// Returns None when the text trims to nothing
    pub fn new(role: Role, text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            role,
            text: text.to_string(),
        })
    }
}

type Threads = BTreeMap<String, Vec<HistoryEntry>>;

/// Capped per-thread history, snapshotted to disk on every mutation.
pub struct HistoryStore {
    path: PathBuf,
    max_messages: usize,
    threads: Mutex<Threads>,
}

impl HistoryStore {
    /// Open the store, loading whatever valid history the snapshot holds.
    ///
    /// A missing or malformed snapshot starts an empty store.
    pub fn open(path: impl Into<PathBuf>, history_turns: usize) -> Self {
        let path = path.into();
        let max_messages = max_messages_for(history_turns);
        let threads = load_snapshot(&path, max_messages);
        tracing::info!(
            path = %path.display(),
            threads = threads.len(),
            max_messages,
            "History store loaded"
        );
        Self {
            path,
            max_messages,
            threads: Mutex::new(threads),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn thread_count(&self) -> usize {
        self.lock().len()
    }

    /// Record a turn and rewrite the snapshot.
    ///
    /// Blank text is ignored. The in-memory append stands even if the
    /// snapshot write fails; the write error is returned.
    pub fn append(&self, key: &ThreadKey, role: Role, text: &str) -> Result<()> {
        let Some(entry) = HistoryEntry::new(role, text) else {
            return Ok(());
        };

        let mut threads = self.lock();
        let bucket = threads.entry(key.to_string()).or_default();
        bucket.push(entry);
        if bucket.len() > self.max_messages {
            let overflow = bucket.len() - self.max_messages;
            bucket.drain(..overflow);
        }
        write_snapshot(&self.path, &threads)
    }

    /// Independent copy of a thread's turns, oldest first
    pub fn snapshot(&self, key: &ThreadKey) -> Vec<HistoryEntry> {
        self.lock()
            .get(&key.to_string())
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Threads> {
        match self.threads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Two messages per turn, never fewer than one turn
pub fn max_messages_for(history_turns: usize) -> usize {
    history_turns.saturating_mul(2).max(2)
}

fn load_snapshot(path: &Path, max_messages: usize) -> Threads {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Threads::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read history snapshot, starting empty");
            return Threads::new();
        }
    };

    let raw: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Malformed history snapshot, starting empty");
            return Threads::new();
        }
    };

    let Value::Object(map) = raw else {
        tracing::warn!(path = %path.display(), "History snapshot is not an object, starting empty");
        return Threads::new();
    };

    let mut threads = Threads::new();
    for (key, rows) in map {
        let Value::Array(rows) = rows else {
            continue;
        };
        let mut entries: Vec<HistoryEntry> = rows.iter().filter_map(parse_row).collect();
        if entries.is_empty() {
            continue;
        }
        if entries.len() > max_messages {
            let overflow = entries.len() - max_messages;
            entries.drain(..overflow);
        }
        threads.insert(key, entries);
    }
    threads
}

fn parse_row(row: &Value) -> Option<HistoryEntry> {
    let role = Role::parse(row.get("role")?.as_str()?)?;
    HistoryEntry::new(role, row.get("text")?.as_str()?)
}

fn write_snapshot(path: &Path, threads: &Threads) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(threads).context("Failed to serialize history")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write history snapshot {}", path.display()))?;
    Ok(())
}
