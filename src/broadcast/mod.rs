//! Real-time fan-out of accepted readings.
//!
//! Broadcasting is best effort: the coordinator dispatches a publish after a
//! reading has been persisted and never waits on the result. Failures are
//! logged and counted, nothing more.

pub mod log_only;
pub mod pusher;

use crate::telemetry::Reading;
use async_trait::async_trait;

pub use log_only::LogBroadcaster;
pub use pusher::{PusherBroadcaster, PusherConfig};

/// Channel every reading is published on.
pub const SENSOR_CHANNEL: &str = "sensor-channel";

/// Event name used for each new reading.
pub const NEW_DATA_EVENT: &str = "new-data";

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("Broadcast request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Broadcast rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to encode broadcast payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to sign broadcast request: {0}")]
    Signing(String),
}

/// Publishes readings to live subscribers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        reading: &Reading,
    ) -> Result<(), BroadcastError>;
}
