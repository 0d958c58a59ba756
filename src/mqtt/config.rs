use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Broker connection and subscription settings.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    /// `mqtt://host:port`, `tcp://host:port`, `host:port` or `host`
    pub url: String,
    pub topic: String,
    pub client_id: String,
    /// Credentials are only sent when a username is set.
    pub username: String,
    pub password: String,
    pub keep_alive_secs: u64,
    /// Upper bound on payloads processed concurrently from the broker.
    pub max_in_flight: usize,
    /// Pause after an event-loop error before polling (and reconnecting) again.
    pub retry_delay_secs: u64,
    /// rumqttc request channel capacity.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: "tcp://localhost:1883".to_string(),
            topic: "datacompass/telemetry".to_string(),
            client_id: "compass-subscriber".to_string(),
            username: String::new(),
            password: String::new(),
            keep_alive_secs: 30,
            max_in_flight: 64,
            retry_delay_secs: 2,
            channel_capacity: 100,
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}
