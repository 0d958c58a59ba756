use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unvalidated telemetry envelope exactly as the producer sent it.
///
/// Producers put a JSON-encoded sensor document in `data` and a
/// JSON-encoded radio envelope (with a Unix-seconds `time`) in `radio`.
/// Every other field is kept untouched so `/raw` shows what really arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPayload(Value);

impl RawPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parses a broker message body.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes).map(Self)
    }

    /// Top-level field lookup; `None` when absent or when the payload is not an object.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_verbatim() {
        let value = json!({"data": "{}", "radio": "{}", "extra": [1, 2]});
        let raw = RawPayload::new(value.clone());
        assert_eq!(serde_json::to_value(&raw).unwrap(), value);
    }

    #[test]
    fn test_from_slice_rejects_non_json() {
        assert!(RawPayload::from_slice(b"not json").is_err());
    }

    #[test]
    fn test_field_on_non_object() {
        let raw = RawPayload::new(json!([1, 2, 3]));
        assert!(raw.field("data").is_none());
    }
}
