//! Raw envelope validation.
//!
//! Checks run in a fixed order (sensor document, radio document, timestamp,
//! sensor fields) and the first failure wins. Validation is by type only:
//! any JSON number is accepted for a sensor field, whatever its range.

use chrono::DateTime;
use serde_json::Value;
use thiserror::Error;

use super::{RawPayload, Reading};

/// Source keys of the sensor document, in the order they are checked.
pub const SENSOR_FIELDS: [&str; 6] = ["T", "RH", "GM", "CO2", "Vol", "Tm"];

/// Why a raw payload did not become a [`Reading`].
///
/// All variants are final: the same payload is rejected the same way every
/// time, so nothing here is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed sensor JSON: {0}")]
    MalformedSensorJson(String),

    #[error("malformed radio JSON: {0}")]
    MalformedRadioJson(String),

    #[error("invalid timestamp")]
    InvalidTimestamp,

    #[error("invalid sensor field: {0}")]
    InvalidSensorField(&'static str),
}

/// Turns a raw envelope into a [`Reading`] or explains why it can't.
pub fn decode(raw: &RawPayload) -> Result<Reading, DecodeError> {
    let sensor = embedded_document(raw, "data").map_err(DecodeError::MalformedSensorJson)?;
    let radio = embedded_document(raw, "radio").map_err(DecodeError::MalformedRadioJson)?;

    let time = radio
        .get("time")
        .and_then(unix_seconds)
        .ok_or(DecodeError::InvalidTimestamp)?;
    let timestamp_ms = (time * 1000.0).floor();
    if !timestamp_ms.is_finite() {
        return Err(DecodeError::InvalidTimestamp);
    }
    // Saturating cast; out-of-range values are refused by chrono below.
    let timestamp =
        DateTime::from_timestamp_millis(timestamp_ms as i64).ok_or(DecodeError::InvalidTimestamp)?;

    let mut values = [0.0_f64; SENSOR_FIELDS.len()];
    for (slot, name) in values.iter_mut().zip(SENSOR_FIELDS) {
        *slot = sensor
            .get(name)
            .and_then(Value::as_f64)
            .ok_or(DecodeError::InvalidSensorField(name))?;
    }
    let [temperature, humidity, gm, co2, vol, tm] = values;

    Ok(Reading {
        temperature,
        humidity,
        gm,
        co2,
        vol,
        tm,
        timestamp,
    })
}

/// `time` as a JSON number, or a string holding one (`"1700000000"`).
fn unix_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|t| t.is_finite()),
        _ => None,
    }
}

/// Fields like `data` and `radio` carry a JSON document encoded as a string.
fn embedded_document(raw: &RawPayload, field: &str) -> Result<Value, String> {
    match raw.field(field) {
        Some(Value::String(encoded)) => serde_json::from_str(encoded).map_err(|e| e.to_string()),
        Some(other) => Err(format!("`{field}` is not a string but {}", kind(other))),
        None => Err(format!("missing `{field}` field")),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
