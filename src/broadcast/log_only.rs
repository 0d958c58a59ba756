use super::{BroadcastError, Broadcaster};
use crate::telemetry::Reading;
use async_trait::async_trait;
use tracing::debug;

/// Stand-in used when no Pusher credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBroadcaster;

#[async_trait]
impl Broadcaster for LogBroadcaster {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        reading: &Reading,
    ) -> Result<(), BroadcastError> {
        debug!(%channel, %event, timestamp = %reading.timestamp, "broadcast (log only)");
        Ok(())
    }
}
