//! Service configuration.
//!
//! Load order: built-in defaults, then the TOML file, then environment
//! variables. The TOML file lives at `$DATACOMPASS_CONFIG` or
//! `~/.datacompass/config.toml`; a missing file is not an error. Empty
//! environment variables are ignored so an unset `.env` entry never blanks a
//! value from the file.

use crate::broadcast::PusherConfig;
use crate::mqtt::config::MqttConfig;
use crate::mqtt::parse_broker_url;
use crate::persistence::DEFAULT_MEMORY_CAPACITY;
use crate::telemetry::ring_buffer::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".datacompass";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "DATACOMPASS_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mqtt: MqttConfig,
    pub store: StoreConfig,
    pub pusher: PusherConfig,
    pub ingest: IngestConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid(format!(
                "unknown store backend `{other}` (expected postgres or memory)"
            ))),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
    /// Readings retained by the `memory` backend.
    pub memory_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            database: "data_compass".to_string(),
            username: "postgres".to_string(),
            password: String::new(),
            max_pool_size: 8,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Raw payloads kept for `/raw`.
    pub buffer_capacity: usize,
    /// Readings returned by `/raw/filtered`.
    pub recent_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            recent_limit: 15,
        }
    }
}

impl AppConfig {
    /// Defaults, then the config file, then the process environment.
    pub async fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        let mut config = Self::from_file(&path).await?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        info!(
            path = %path.display(),
            store = %config.store.backend,
            topic = %config.mqtt.topic,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path.trim());
            }
        }
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Reads `path`; a missing file yields the defaults.
    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if !exists {
            warn!(path = %path.display(), "config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "parsing config file");
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides fields from environment-style `lookup`. Blank values are skipped.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("HTTP_HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("PORT") {
            self.server.port = parse_port("PORT", &v)?;
        }

        if let Some(v) = var("MQTT_URL") {
            self.mqtt.url = v;
        }
        if let Some(v) = var("MQTT_TOPIC") {
            self.mqtt.topic = v;
        }
        if let Some(v) = var("MQTT_USER") {
            self.mqtt.username = v;
        }
        if let Some(v) = var("MQTT_PASS") {
            self.mqtt.password = v;
        }
        if let Some(v) = var("MQTT_CLIENT_ID") {
            self.mqtt.client_id = v;
        }

        if let Some(v) = var("STORE_BACKEND") {
            self.store.backend = v.parse()?;
        }
        if let Some(v) = var("PG_HOST") {
            self.store.host = v;
        }
        if let Some(v) = var("PG_PORT") {
            self.store.port = parse_port("PG_PORT", &v)?;
        }
        if let Some(v) = var("PG_DB") {
            self.store.database = v;
        }
        if let Some(v) = var("PG_USER") {
            self.store.username = v;
        }
        if let Some(v) = var("PG_PASS") {
            self.store.password = v;
        }

        if let Some(v) = var("PUSHER_APP_ID") {
            self.pusher.app_id = v;
        }
        if let Some(v) = var("PUSHER_KEY") {
            self.pusher.key = v;
        }
        if let Some(v) = var("PUSHER_SECRET") {
            self.pusher.secret = v;
        }
        if let Some(v) = var("PUSHER_CLUSTER") {
            self.pusher.cluster = v;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "ingest.buffer_capacity must be at least 1".to_string(),
            ));
        }
        if self.ingest.recent_limit == 0 {
            return Err(ConfigError::Invalid(
                "ingest.recent_limit must be at least 1".to_string(),
            ));
        }
        if self.mqtt.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "mqtt.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.mqtt.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("mqtt.topic must not be empty".to_string()));
        }
        parse_broker_url(&self.mqtt.url)
            .map_err(|e| ConfigError::Invalid(format!("mqtt.url: {e}")))?;
        if self.store.max_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "store.max_pool_size must be at least 1".to_string(),
            ));
        }
        if self.store.memory_capacity == 0 {
            return Err(ConfigError::Invalid(
                "store.memory_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} is not a valid port: {value}")))
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ingest.buffer_capacity, 100);
        assert_eq!(config.ingest.recent_limit, 15);
        assert_eq!(config.store.backend, StoreBackend::Postgres);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [mqtt]
            topic = "v2.0/subs/APP/DEV"

            [store]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.mqtt.topic, "v2.0/subs/APP/DEV");
        assert_eq!(config.mqtt.client_id, "compass-subscriber");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.database, "data_compass");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("PORT", "8080"),
                ("MQTT_URL", "mqtt://broker.example:1884"),
                ("MQTT_USER", "device"),
                ("PG_PORT", "6543"),
                ("STORE_BACKEND", "Memory"),
                ("PUSHER_APP_ID", "1993310"),
                ("PUSHER_CLUSTER", "eu"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.mqtt.url, "mqtt://broker.example:1884");
        assert_eq!(config.mqtt.username, "device");
        assert_eq!(config.store.port, 6543);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.pusher.app_id, "1993310");
        assert_eq!(config.pusher.cluster, "eu");
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("MQTT_TOPIC", "   "), ("PG_HOST", "")]))
            .unwrap();

        assert_eq!(config.mqtt.topic, MqttConfig::default().topic);
        assert_eq!(config.store.host, "localhost");
    }

    #[test]
    fn test_invalid_env_values_are_rejected() {
        let mut config = AppConfig::default();
        assert!(matches!(
            config.apply_env(env(&[("PORT", "eighty")])),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            config.apply_env(env(&[("STORE_BACKEND", "sqlite")])),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.ingest.buffer_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.mqtt.max_in_flight = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.store.memory_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unusable_broker_url() {
        let mut config = AppConfig::default();
        config.mqtt.url = "mqtt://broker.local:notaport".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(&err, ConfigError::Invalid(msg) if msg.starts_with("mqtt.url")));

        config
            .apply_env(|key| (key == "MQTT_URL").then(|| "tcp://broker.local:1884".to_string()))
            .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        assert!(matches!(
            AppConfig::from_toml_str("[mqtt\ntopic ="),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("datacompass-does-not-exist.toml");
        let config = AppConfig::from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
