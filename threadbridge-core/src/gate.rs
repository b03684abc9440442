// ABOUTME: Counting gate that bounds simultaneous assistant invocations.
// ABOUTME: Releasing a slot is dropping its permit, so every exit path frees it.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_GATE_CAPACITY: usize = 2;

#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot; the slot is released when this is dropped
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Give the slot back explicitly
    pub fn release(self) {}
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(DEFAULT_GATE_CAPACITY)
    }
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a slot is free and take it
    pub async fn acquire(&self) -> GatePermit {
        // The semaphore is private and never closed, so acquire cannot fail
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("concurrency gate semaphore is never closed");
        GatePermit { _permit: permit }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
