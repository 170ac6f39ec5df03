//! Inbound bridge frames
//!
//! The bridge writes one JSON object per line. Key spellings vary between
//! firmware builds (`deviceId` / `device_id`, `type` / `message_type`), so
//! accessors take the first spelling that carries a usable value.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::STATUS_UNKNOWN;

/// Why a line was not accepted as a frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("line does not start with '{{'")]
    NotJson,

    #[error("invalid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("JSON value is not an object")]
    NotObject,
}

/// Message type tag carried in `type` / `message_type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    Heartbeat,
    Test,
    Emergency,
    Status,
    Missing,
    Other(String),
}

impl MessageType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "heartbeat" => Self::Heartbeat,
            "test" => Self::Test,
            "emergency" => Self::Emergency,
            "status" => Self::Status,
            "missing" => Self::Missing,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Test => "test",
            Self::Emergency => "emergency",
            Self::Status => "status",
            Self::Missing => "missing",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed frame from the bridge
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeMessage {
    fields: Map<String, Value>,
}

/// Parse one decoded line into a frame
pub fn parse_line(line: &str) -> Result<BridgeMessage, FrameError> {
    if !line.starts_with('{') {
        return Err(FrameError::NotJson);
    }
    match serde_json::from_str::<Value>(line)? {
        Value::Object(fields) => Ok(BridgeMessage { fields }),
        _ => Err(FrameError::NotObject),
    }
}

impl BridgeMessage {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Compact JSON text of the whole frame
    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    /// First of `keys` holding a non-empty string or a number
    pub fn first_present(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.fields.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn device_id(&self) -> Option<String> {
        self.first_present(&["deviceId", "device_id"])
    }

    pub fn model_id(&self) -> Option<String> {
        self.first_present(&["modelId", "model_id"])
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.first_present(&["type", "message_type"])
            .map(|tag| MessageType::parse(&tag))
    }

    /// Heartbeats are tagged `type: heartbeat` or carry a `heartbeat` key
    pub fn is_heartbeat(&self) -> bool {
        matches!(self.fields.get("type"), Some(Value::String(t)) if t == "heartbeat")
            || self.fields.contains_key("heartbeat")
    }

    /// Field as text; strings verbatim, other non-null values as JSON text
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Field as text, `unknown` when missing or null
    pub fn text_or_unknown(&self, key: &str) -> String {
        self.text(key).unwrap_or_else(|| STATUS_UNKNOWN.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_json_lines() {
        assert!(matches!(parse_line("READY"), Err(FrameError::NotJson)));
        assert!(matches!(parse_line(" {\"a\":1}"), Err(FrameError::NotJson)));
        assert!(matches!(parse_line(""), Err(FrameError::NotJson)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            parse_line("{\"device_id\": "),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn test_camel_case_keys_win() {
        let msg = parse_line(r#"{"deviceId":"A","device_id":"B","modelId":"0401","model_id":"0301"}"#)
            .unwrap();
        assert_eq!(msg.device_id().as_deref(), Some("A"));
        assert_eq!(msg.model_id().as_deref(), Some("0401"));
    }

    #[test]
    fn test_null_or_empty_falls_through() {
        let msg = parse_line(r#"{"deviceId":null,"device_id":"B","type":"","message_type":"status"}"#)
            .unwrap();
        assert_eq!(msg.device_id().as_deref(), Some("B"));
        assert_eq!(msg.message_type(), Some(MessageType::Status));
    }

    #[test]
    fn test_numeric_device_id() {
        let msg = parse_line(r#"{"device_id":4711}"#).unwrap();
        assert_eq!(msg.device_id().as_deref(), Some("4711"));
    }

    #[test]
    fn test_heartbeat_detection() {
        assert!(parse_line(r#"{"type":"heartbeat"}"#).unwrap().is_heartbeat());
        assert!(parse_line(r#"{"heartbeat":1}"#).unwrap().is_heartbeat());
        assert!(parse_line(r#"{"heartbeat":null}"#).unwrap().is_heartbeat());
        // only `type` marks a heartbeat, not `message_type`
        assert!(!parse_line(r#"{"message_type":"heartbeat"}"#)
            .unwrap()
            .is_heartbeat());
    }

    #[test]
    fn test_unknown_type_is_kept() {
        let msg = parse_line(r#"{"type":"pairing"}"#).unwrap();
        assert_eq!(
            msg.message_type(),
            Some(MessageType::Other("pairing".to_string()))
        );
    }

    #[test]
    fn test_text_fields() {
        let msg = parse_line(r#"{"battery":"low","base":null,"result":true}"#).unwrap();
        assert_eq!(msg.text("battery").as_deref(), Some("low"));
        assert_eq!(msg.text("base"), None);
        assert_eq!(msg.text("result").as_deref(), Some("true"));
        assert_eq!(msg.text_or_unknown("event_type"), "unknown");
    }
}
