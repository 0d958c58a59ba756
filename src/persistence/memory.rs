use super::{ReadingStore, StoreError};
use crate::telemetry::Reading;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::debug;

/// Readings kept by [`InMemoryReadingStore::new`].
pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

/// Process-local reading store for local runs and tests. Contents are lost on
/// restart, and once `capacity` readings are held the earliest-appended one is
/// dropped for each new append.
#[derive(Debug)]
pub struct InMemoryReadingStore {
    capacity: usize,
    readings: RwLock<VecDeque<Reading>>,
}

impl Default for InMemoryReadingStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.readings.read().await.is_empty()
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        let mut readings = self.readings.write().await;
        if readings.len() == self.capacity {
            readings.pop_front();
        }
        readings.push_back(reading.clone());
        debug!(stored = readings.len(), "reading appended in memory");
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Reading>, StoreError> {
        let readings = self.readings.read().await;
        let mut newest: Vec<&Reading> = readings.iter().collect();
        newest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(newest.into_iter().take(limit).cloned().collect())
    }
}
