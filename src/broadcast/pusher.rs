//! Pusher Channels REST publisher.
//!
//! Each publish is one signed `POST /apps/{app_id}/events`. The signature is
//! an HMAC-SHA256 over `POST\n{path}\n{query}` where the query holds the auth
//! parameters sorted by key, including the MD5 of the exact body bytes.

use super::{BroadcastError, Broadcaster};
use crate::telemetry::Reading;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const AUTH_VERSION: &str = "1.0";

/// Pusher application credentials.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PusherConfig {
    pub app_id: String,
    pub key: String,
    pub secret: String,
    pub cluster: String,
    /// Overrides `api-{cluster}.pusher.com`, e.g. for a self-hosted relay.
    pub host: Option<String>,
    pub use_tls: bool,
    pub timeout_secs: u64,
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            key: String::new(),
            secret: String::new(),
            cluster: "ap1".to_string(),
            host: None,
            use_tls: true,
            timeout_secs: 5,
        }
    }
}

impl PusherConfig {
    /// All three credentials are needed to sign a request.
    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.key.is_empty() && !self.secret.is_empty()
    }

    fn host(&self) -> String {
        self.host
            .clone()
            .unwrap_or_else(|| format!("api-{}.pusher.com", self.cluster))
    }

    fn scheme(&self) -> &'static str {
        if self.use_tls {
            "https"
        } else {
            "http"
        }
    }
}

#[derive(Serialize)]
struct TriggerBody<'a> {
    name: &'a str,
    channels: [&'a str; 1],
    /// Pusher expects the event payload as a JSON string, not an object.
    data: String,
}

pub struct PusherBroadcaster {
    client: reqwest::Client,
    config: PusherConfig,
}

impl PusherBroadcaster {
    pub fn new(config: PusherConfig) -> Result<Self, BroadcastError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn events_path(&self) -> String {
        format!("/apps/{}/events", self.config.app_id)
    }

    /// Query string including `auth_signature` for the given body and time.
    fn signed_query(&self, body: &[u8], auth_timestamp: i64) -> Result<String, BroadcastError> {
        let body_md5 = format!("{:x}", md5::compute(body));
        // Keys are already in lexical order.
        let query = format!(
            "auth_key={}&auth_timestamp={}&auth_version={}&body_md5={}",
            self.config.key, auth_timestamp, AUTH_VERSION, body_md5
        );
        let to_sign = format!("POST\n{}\n{}", self.events_path(), query);

        let mut mac = HmacSha256::new_from_slice(self.config.secret.as_bytes())
            .map_err(|e| BroadcastError::Signing(e.to_string()))?;
        mac.update(to_sign.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{query}&auth_signature={signature}"))
    }

    fn encode_body(event: &str, channel: &str, reading: &Reading) -> Result<Vec<u8>, BroadcastError> {
        let body = TriggerBody {
            name: event,
            channels: [channel],
            data: serde_json::to_string(reading)?,
        };
        Ok(serde_json::to_vec(&body)?)
    }
}

#[async_trait]
impl Broadcaster for PusherBroadcaster {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        reading: &Reading,
    ) -> Result<(), BroadcastError> {
        let body = Self::encode_body(event, channel, reading)?;
        let query = self.signed_query(&body, chrono::Utc::now().timestamp())?;
        let url = format!(
            "{}://{}{}?{}",
            self.config.scheme(),
            self.config.host(),
            self.events_path(),
            query
        );

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BroadcastError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(%channel, %event, "pusher event triggered");
        Ok(())
    }
}
