//! Per-payload state machine with statum typestates
//!
//! ```text
//! Received ──► Buffered ──► Validated ──► Persisted ──► (broadcast)
//!                  │             │
//!                  ▼             ▼
//!              Rejected     PersistFailed
//! ```
//!
//! The failure branches are not states of their own: a failed step hands back
//! the error and the run is dropped. Each step consumes the previous state, so
//! a reading that failed to persist has no `PayloadRun<Persisted>` to be
//! broadcast from.

use super::coordinator::Origin;
use crate::broadcast::{BroadcastError, Broadcaster, NEW_DATA_EVENT, SENSOR_CHANNEL};
use crate::persistence::{ReadingStore, StoreError};
use crate::telemetry::{decode, DecodeError, RawPayload, RawRingBuffer, Reading};
use statum::{machine, state};

#[state]
#[derive(Debug, Clone)]
pub enum PayloadState {
    Received,  // Accepted from a transport
    Buffered,  // Recorded in the raw ring buffer
    Validated, // Decoded into a Reading
    Persisted, // Written to the reading store
}

#[machine]
pub struct PayloadRun<S: PayloadState> {
    id: u64,
    origin: Origin,
    raw: RawPayload,
}

impl<S: PayloadState> PayloadRun<S> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

impl PayloadRun<Received> {
    pub fn receive(id: u64, origin: Origin, raw: RawPayload) -> Self {
        Self::new(id, origin, raw)
    }

    /// Records the raw payload regardless of what decoding will say about it.
    pub async fn buffer(self, buffer: &RawRingBuffer) -> PayloadRun<Buffered> {
        buffer.push(self.raw.clone()).await;
        self.transition()
    }
}

impl PayloadRun<Buffered> {
    pub fn validate(self) -> Result<(PayloadRun<Validated>, Reading), DecodeError> {
        let reading = decode(&self.raw)?;
        Ok((self.transition(), reading))
    }
}

impl PayloadRun<Validated> {
    pub async fn persist(
        self,
        store: &dyn ReadingStore,
        reading: &Reading,
    ) -> Result<PayloadRun<Persisted>, StoreError> {
        store.append(reading).await?;
        Ok(self.transition())
    }
}

impl PayloadRun<Persisted> {
    /// Terminal step; consumes the run.
    pub async fn broadcast(
        self,
        broadcaster: &dyn Broadcaster,
        reading: &Reading,
    ) -> Result<(), BroadcastError> {
        broadcaster
            .publish(SENSOR_CHANNEL, NEW_DATA_EVENT, reading)
            .await
    }
}
