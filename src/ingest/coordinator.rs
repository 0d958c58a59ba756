use super::pipeline::{PayloadRun, Persisted, Received};
use super::stats::{IngestStats, StatsSnapshot};
use crate::broadcast::Broadcaster;
use crate::persistence::{ReadingStore, StoreError};
use crate::telemetry::{DecodeError, RawPayload, RawRingBuffer, Reading};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// Transport a payload arrived on. Processing is identical for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Broker,
    Http,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Origin::Broker => write!(f, "broker"),
            Origin::Http => write!(f, "http"),
        }
    }
}

/// How far a payload got through the pipeline.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Decoding failed; nothing was stored or broadcast.
    Rejected(DecodeError),
    /// The reading was valid but the store refused it; nothing was broadcast.
    PersistFailed(StoreError),
    /// Stored. The broadcast has been dispatched but not awaited.
    Persisted(Reading),
}

/// Drives every inbound payload through buffer, decode, persist and broadcast.
///
/// Shared behind an `Arc` by the MQTT subscriber and the HTTP handlers. All
/// failures are contained in the payload that caused them.
pub struct IngestCoordinator {
    buffer: Arc<RawRingBuffer>,
    store: Arc<dyn ReadingStore>,
    broadcaster: Arc<dyn Broadcaster>,
    stats: Arc<IngestStats>,
    broadcasts: TaskTracker,
    next_id: AtomicU64,
}

impl IngestCoordinator {
    pub fn new(
        buffer: Arc<RawRingBuffer>,
        store: Arc<dyn ReadingStore>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            buffer,
            store,
            broadcaster,
            stats: Arc::new(IngestStats::default()),
            broadcasts: TaskTracker::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn buffer(&self) -> &Arc<RawRingBuffer> {
        &self.buffer
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Processes one payload. Each call gets its own root span so traces of
    /// concurrent payloads never nest.
    pub async fn process(&self, raw: RawPayload, origin: Origin) -> IngestOutcome {
        let run = PayloadRun::receive(self.next_id.fetch_add(1, Ordering::Relaxed), origin, raw);
        let span = info_span!(
            parent: Span::none(),
            "ingest",
            payload_id = run.id(),
            origin = %run.origin()
        );

        self.run(run).instrument(span).await
    }

    async fn run(&self, run: PayloadRun<Received>) -> IngestOutcome {
        self.stats.record_received();
        let run = run.buffer(&self.buffer).await;

        let (run, reading) = match run.validate() {
            Ok(validated) => validated,
            Err(e) => {
                warn!(error = %e, "invalid sensor data, payload dropped");
                self.stats.record_rejected();
                return IngestOutcome::Rejected(e);
            }
        };

        let run = match run.persist(self.store.as_ref(), &reading).await {
            Ok(run) => run,
            Err(e) => {
                error!(error = %e, "failed to persist reading");
                self.stats.record_persist_failed();
                return IngestOutcome::PersistFailed(e);
            }
        };
        self.stats.record_persisted();
        debug!(timestamp = %reading.timestamp, "reading persisted");

        self.dispatch_broadcast(run, reading.clone());
        IngestOutcome::Persisted(reading)
    }

    fn dispatch_broadcast(&self, run: PayloadRun<Persisted>, reading: Reading) {
        let broadcaster = Arc::clone(&self.broadcaster);
        let stats = Arc::clone(&self.stats);

        self.broadcasts.spawn(
            async move {
                match run.broadcast(broadcaster.as_ref(), &reading).await {
                    Ok(()) => {
                        stats.record_broadcast();
                        debug!("reading broadcast");
                    }
                    Err(e) => {
                        stats.record_broadcast_failed();
                        warn!(error = %e, "broadcast failed");
                    }
                }
            }
            .in_current_span(),
        );
    }

    /// Waits for every broadcast dispatched so far.
    pub async fn drain(&self) {
        self.broadcasts.close();
        if !self.broadcasts.is_empty() {
            info!(pending = self.broadcasts.len(), "waiting for pending broadcasts");
        }
        self.broadcasts.wait().await;
        self.broadcasts.reopen();
    }
}
