use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validated, normalized sensor record.
///
/// Only [`crate::telemetry::decode`] creates these from inbound payloads, so
/// every value is a finite number and `timestamp` is a real instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    pub gm: f64,
    pub co2: f64,
    pub vol: f64,
    pub tm: f64,
    #[serde(with = "millis_rfc3339")]
    pub timestamp: DateTime<Utc>,
}

/// `2023-11-14T22:13:20.000Z`: always three fractional digits and a `Z`.
mod millis_rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
