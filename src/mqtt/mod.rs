//! # MQTT Ingress Module
//!
//! Subscribes to the sensor telemetry topic on an MQTT broker and feeds every
//! message into the shared ingestion pipeline.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs      - Broker connection settings and defaults
//! └── subscriber.rs  - rumqttc event loop, reconnect handling, message dispatch
//! ```
//!
//! ## Connection Lifecycle
//!
//! rumqttc reconnects on its own whenever the event loop is polled after an
//! error. The subscriber waits `retry_delay_secs` between failed polls and
//! re-issues its subscription on every `ConnAck`, since the session is clean.
//!
//! ## Message Handling
//!
//! Bodies that are not JSON are logged and skipped before they reach the raw
//! buffer. Everything else is handed to
//! [`IngestCoordinator::process`](crate::ingest::IngestCoordinator::process) on
//! a task of its own, with at most `max_in_flight` of those running at once.

pub mod config;
pub mod subscriber;

pub use config::MqttConfig;
pub use subscriber::{parse_broker_url, MqttSubscriber, SubscriberError};
