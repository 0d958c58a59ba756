use std::collections::VecDeque;
use tokio::sync::Mutex;

use super::RawPayload;

pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded, most-recent-first window of raw payloads.
///
/// Shared between the broker subscriber and the HTTP handlers. Insertion and
/// eviction happen under one lock, so no reader ever sees more than
/// `capacity` entries. Contents are diagnostic only and vanish on restart.
#[derive(Debug)]
pub struct RawRingBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<RawPayload>>,
}

impl RawRingBuffer {
    /// A zero capacity is bumped to one; config validation rejects it earlier.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    /// Puts `raw` at index 0 and drops the oldest entry when over capacity.
    pub async fn push(&self, raw: RawPayload) {
        let mut entries = self.entries.lock().await;
        entries.push_front(raw);
        while entries.len() > self.capacity {
            entries.pop_back();
        }
    }

    /// Point-in-time copy, most recent first.
    pub async fn snapshot(&self) -> Vec<RawPayload> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RawRingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
