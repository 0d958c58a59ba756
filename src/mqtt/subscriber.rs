use super::config::MqttConfig;
use crate::ingest::{IngestCoordinator, Origin};
use crate::telemetry::RawPayload;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

/// Readings are not idempotent in the store, so no broker redelivery.
pub const SUBSCRIBE_QOS: QoS = QoS::AtMostOnce;

/// How long shutdown waits for the DISCONNECT packet to go out.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
}

/// Broker-side ingress: one [`IngestCoordinator::process`] task per message.
///
/// The receive loop itself never waits on storage or broadcasting. It only
/// waits for an in-flight permit when `max_in_flight` handlers are busy, which
/// pushes back on the rumqttc event loop instead of queueing without bound.
pub struct MqttSubscriber {
    config: MqttConfig,
    coordinator: Arc<IngestCoordinator>,
    in_flight: Arc<Semaphore>,
    handlers: TaskTracker,
}

impl MqttSubscriber {
    pub fn new(config: MqttConfig, coordinator: Arc<IngestCoordinator>) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            config,
            coordinator,
            in_flight,
            handlers: TaskTracker::new(),
        }
    }

    /// Runs until `shutdown` fires. Connection errors are logged and retried
    /// after `retry_delay`; rumqttc reconnects on the next poll.
    #[instrument(
        name = "mqtt_subscriber",
        skip_all,
        fields(broker_url = %self.config.url, topic = %self.config.topic)
    )]
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), SubscriberError> {
        let (host, port) = parse_broker_url(&self.config.url)?;

        let mut mqtt_options = MqttOptions::new(&self.config.client_id, host, port);
        mqtt_options.set_keep_alive(self.config.keep_alive());
        mqtt_options.set_clean_session(true);
        if !self.config.username.is_empty() {
            mqtt_options.set_credentials(&self.config.username, &self.config.password);
        }

        let (client, mut eventloop) =
            AsyncClient::new(mqtt_options, self.config.channel_capacity.max(1));

        info!(client_id = %self.config.client_id, "starting MQTT subscriber");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("shutdown signal received");
                    break;
                }
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            info!("connected to MQTT broker");
                            // Clean sessions drop subscriptions, so subscribe on every connect.
                            match client.subscribe(&self.config.topic, SUBSCRIBE_QOS).await {
                                Ok(()) => info!("subscription requested"),
                                Err(e) => error!(error = %e, "subscribe request failed"),
                            }
                        }
                        Ok(Event::Incoming(Packet::SubAck(ack))) => {
                            debug!(codes = ?ack.return_codes, "subscription acknowledged");
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            self.dispatch(&publish.topic, &publish.payload).await;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(
                                error = %e,
                                retry_in_secs = self.config.retry_delay_secs,
                                "MQTT connection error, retrying"
                            );
                            tokio::select! {
                                _ = shutdown.cancelled() => break,
                                _ = tokio::time::sleep(self.config.retry_delay()) => {}
                            }
                        }
                    }
                }
            }
        }

        disconnect(&client, &mut eventloop).await;
        self.wait_idle().await;
        info!("MQTT subscriber stopped");
        Ok(())
    }

    /// Parses one broker message and hands it to the coordinator on its own task.
    pub(crate) async fn dispatch(&self, topic: &str, payload: &[u8]) {
        debug!(%topic, payload_size = payload.len(), "MQTT message received");

        let raw = match RawPayload::from_slice(payload) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%topic, error = %e, "MQTT message is not JSON, skipping");
                return;
            }
        };

        let permit = match Arc::clone(&self.in_flight).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("in-flight limiter closed, dropping message");
                return;
            }
        };

        let coordinator = Arc::clone(&self.coordinator);
        self.handlers.spawn(async move {
            let _permit = permit;
            coordinator.process(raw, Origin::Broker).await;
        });
    }

    /// Waits for every message handler spawned so far.
    pub(crate) async fn wait_idle(&self) {
        self.handlers.close();
        self.handlers.wait().await;
        self.handlers.reopen();
    }
}

/// Queues a DISCONNECT and polls the event loop until it has been written.
async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        debug!(error = %e, "disconnect request not queued");
        return;
    }

    let flush = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("disconnected from MQTT broker");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "connection closed during disconnect");
                    break;
                }
            }
        }
    };
    if tokio::time::timeout(DISCONNECT_TIMEOUT, flush).await.is_err() {
        warn!("timed out sending DISCONNECT to broker");
    }
}

/// Parse broker URL in format mqtt://host:port or tcp://host:port or host:port
pub fn parse_broker_url(url: &str) -> Result<(&str, u16), SubscriberError> {
    let url = url.trim();
    let url = url.trim_start_matches("mqtt://");
    let url = url.trim_start_matches("tcp://");
    let url = url.trim_end_matches('/');

    let parts: Vec<&str> = url.split(':').collect();
    match parts.as_slice() {
        [host] if !host.is_empty() => Ok((host, 1883)),
        [host, port] if !host.is_empty() => {
            let port = port.parse::<u16>().map_err(|_| {
                SubscriberError::InvalidBrokerUrl(format!("Invalid port in broker URL: {port}"))
            })?;
            Ok((host, port))
        }
        _ => Err(SubscriberError::InvalidBrokerUrl(format!(
            "Invalid broker URL format: {url}"
        ))),
    }
}
