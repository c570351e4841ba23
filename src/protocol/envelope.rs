//! The `{type, data, timestamp}` message envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known envelope tags (magic strings layer)
pub mod tags {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const SUBSCRIBED: &str = "subscribed";
    pub const WELCOME: &str = "welcome";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const ECHO: &str = "echo";
}

/// Wrapper around every realtime message.
///
/// The `type` tag is dispatched by string match on both ends; `data` carries
/// an arbitrary JSON payload. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Envelope {
    /// Create an envelope stamped with the current time
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: Some(now_ms()),
        }
    }

    /// Create an envelope without a timestamp
    pub fn bare(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: None,
        }
    }

    /// Whether the envelope carries the given tag
    pub fn is(&self, tag: &str) -> bool {
        self.kind == tag
    }
}

/// Current Unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_serialization() {
        let env = Envelope::new(tags::PING, json!({"timestamp": 1700000000000i64}));
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains(r#""type":"ping""#));
        assert!(json.contains("1700000000000"));
    }

    #[test]
    fn test_envelope_without_timestamp_omits_field() {
        let env = Envelope::bare(tags::SUBSCRIBE, json!({"topic": "social_updates"}));
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains("timestamp"));
    }

    #[test]
    fn test_envelope_parses_unknown_tag() {
        // Free-form tags are legal; dispatch is by string match
        let env: Envelope = serde_json::from_str(r#"{"type":"custom_thing","data":{"x":1}}"#).unwrap();
        assert_eq!(env.kind, "custom_thing");
        assert_eq!(env.data["x"], 1);
        assert!(env.timestamp.is_none());
    }

    #[test]
    fn test_envelope_defaults_missing_data() {
        let env: Envelope = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(env.data.is_null());
    }

    #[test]
    fn test_now_ms_is_positive() {
        assert!(now_ms() > 0);
    }
}
