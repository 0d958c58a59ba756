//! Ingestion pipeline
//!
//! One entry point for every inbound payload, whatever the transport:
//!
//! ```text
//! MQTT subscriber ──┐
//!                   ├──► IngestCoordinator::process ──► RawRingBuffer
//! HTTP /mqtt/raw ───┘                │
//!                                    ├──► decode ──✗──► Rejected
//!                                    ├──► ReadingStore::append ──✗──► PersistFailed
//!                                    └──► Broadcaster::publish (background task)
//! ```
//!
//! 1. [`pipeline`] - typestate machine for a single payload
//! 2. [`coordinator`] - shared service owning buffer, store, broadcaster
//! 3. [`stats`] - counters exposed on `/stats`

pub mod coordinator;
pub mod pipeline;
pub mod stats;

pub use coordinator::{IngestCoordinator, IngestOutcome, Origin};
pub use stats::{IngestStats, StatsSnapshot};
