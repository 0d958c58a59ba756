//! # Persistence Module
//!
//! ## Why This Module Exists
//! Validated readings have to outlive the process. The ingestion pipeline only
//! needs two things from storage: append one reading atomically, and read the
//! most recent ones back ordered by their own timestamp. This module defines
//! that contract ([`ReadingStore`]) and ships two backends for it.
//!
//! ## Backends
//! - [`postgres::PostgresReadingStore`]: pooled PostgreSQL connections writing
//!   into the `sensor_data` table. The production backend.
//! - [`memory::InMemoryReadingStore`]: a bounded, lock-guarded deque. Used for local
//!   runs without a database (`store.backend = "memory"`) and in tests.
//!
//! ## Error Handling Strategy
//! Every failure is a [`StoreError`]. The coordinator logs it and abandons
//! persistence for that one payload; the next payload gets a fresh attempt.
//! Nothing here retries on its own.
//!
//! ## Ordering
//! Appends may land in any order when payloads are processed concurrently.
//! `recent` always sorts by reading timestamp, never by insertion order.

pub mod memory;
pub mod postgres;

use crate::telemetry::Reading;
use async_trait::async_trait;

pub use memory::{InMemoryReadingStore, DEFAULT_MEMORY_CAPACITY};
pub use postgres::{PostgresClient, PostgresReadingStore};

/// Errors surfaced by a [`ReadingStore`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No connection could be checked out of the pool.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// The statement reached the database and failed there.
    #[error("Query failed: {0}")]
    Query(String),

    /// The backing table could not be created or checked.
    #[error("Schema setup failed: {0}")]
    Schema(String),
}

/// Durable append/query interface for validated readings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persists one reading. Either the whole row is written or nothing is.
    async fn append(&self, reading: &Reading) -> Result<(), StoreError>;

    /// Up to `limit` readings, newest timestamp first.
    async fn recent(&self, limit: usize) -> Result<Vec<Reading>, StoreError>;
}
