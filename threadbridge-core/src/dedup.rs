// ABOUTME: Bounded FIFO set of recently seen event IDs.
// ABOUTME: Rejects redelivered events; the check and insert happen under one lock.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Number of event IDs remembered before the oldest is forgotten
pub const SEEN_EVENT_CAPACITY: usize = 1024;

#[derive(Default)]
struct SeenEvents {
    order: VecDeque<String>,
    members: HashSet<String>,
}

/// Remembers the last `capacity` event IDs.
pub struct Deduplicator {
    capacity: usize,
    seen: Mutex<SeenEvents>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::with_capacity(SEEN_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: Mutex::new(SeenEvents::default()),
        }
    }

    /// Returns true if `id` was already seen. Unseen IDs are recorded.
    ///
    /// Empty IDs are never deduplicated.
    pub fn seen(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if seen.members.contains(id) {
            return true;
        }
        if seen.order.len() >= self.capacity {
            if let Some(oldest) = seen.order.pop_front() {
                seen.members.remove(&oldest);
            }
        }
        seen.order.push_back(id.to_string());
        seen.members.insert(id.to_string());
        false
    }

    pub fn len(&self) -> usize {
        self.seen.lock().map(|s| s.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
