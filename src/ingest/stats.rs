use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters for the pipeline. Relaxed ordering: values are only read
/// for reporting.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    rejected: AtomicU64,
    persisted: AtomicU64,
    persist_failed: AtomicU64,
    broadcast: AtomicU64,
    broadcast_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub rejected: u64,
    pub persisted: u64,
    pub persist_failed: u64,
    pub broadcast: u64,
    pub broadcast_failed: u64,
}

impl IngestStats {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_failed(&self) {
        self.persist_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast(&self) {
        self.broadcast.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast_failed(&self) {
        self.broadcast_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
            broadcast: self.broadcast.load(Ordering::Relaxed),
            broadcast_failed: self.broadcast_failed.load(Ordering::Relaxed),
        }
    }
}
