//! The `{event, data}` envelope carried over the connection.
//!
//! Every frame, in both directions, is one JSON object naming an event and
//! carrying an arbitrary payload. The envelope is decoded strictly; the payload
//! is left as raw JSON for the router to interpret.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::WireError;

/// Acknowledgment payload the server sends for an accepted command.
pub const ACK_OK: &str = "ok";

/// A single frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Event name (`status`, `message`, `ack`, ...)
    pub event: String,
    /// Event payload
    #[serde(default)]
    pub data: Value,
}

/// Recognized event names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Server confirms the session is up.
    Connect,
    /// Server is closing the session.
    Disconnect,
    /// Transport- or server-level error.
    Error,
    /// Free-text message (inbound) or command (outbound).
    Message,
    /// Status push.
    Status,
    /// Acknowledgment of the last command.
    Ack,
    /// Anything else.
    Other(String),
}

impl Frame {
    /// Create a frame from an event name and payload.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Build an outbound command frame.
    ///
    /// The payload is merged into the command object; `command` and
    /// `timestamp` always carry the given values.
    pub fn command(name: &str, timestamp: f64, payload: Map<String, Value>) -> Self {
        let mut data = payload;
        data.insert("command".into(), Value::String(name.to_string()));
        data.insert("timestamp".into(), Value::from(timestamp));
        Self::new("message", Value::Object(data))
    }

    /// Build an acknowledgment frame.
    pub fn ack(value: impl Into<Value>) -> Self {
        Self::new("ack", value.into())
    }

    /// Build a status push frame.
    pub fn status(data: Value) -> Self {
        Self::new("status", data)
    }

    /// Classify the event name (case-insensitive).
    pub fn kind(&self) -> FrameKind {
        match self.event.trim().to_ascii_lowercase().as_str() {
            "connect" => FrameKind::Connect,
            "disconnect" => FrameKind::Disconnect,
            "error" => FrameKind::Error,
            "message" => FrameKind::Message,
            "status" => FrameKind::Status,
            "ack" => FrameKind::Ack,
            _ => FrameKind::Other(self.event.clone()),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from JSON bytes.
    ///
    /// The document must be a JSON object; a positional `[event, data]`
    /// array is rejected even though serde would accept it for a struct.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let value: Value = serde_json::from_slice(bytes).map_err(WireError::Deserialization)?;
        if !value.is_object() {
            return Err(WireError::NotAnObject(json_type_name(&value)));
        }
        serde_json::from_value(value).map_err(WireError::Deserialization)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Seconds since the Unix epoch as a float, the way commands are stamped.
pub fn unix_timestamp(at: SystemTime) -> f64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn command_frame_shape() {
        let mut payload = Map::new();
        payload.insert("target".into(), json!("/media/a"));
        payload.insert("command".into(), json!("spoofed"));

        let frame = Frame::command("copy", 1_700_000_000.5, payload);
        let value: Value = serde_json::from_slice(&frame.to_bytes().unwrap()).unwrap();

        assert_eq!(value["event"], "message");
        assert_eq!(value["data"]["command"], "copy");
        assert_eq!(value["data"]["timestamp"], 1_700_000_000.5);
        assert_eq!(value["data"]["target"], "/media/a");
    }

    #[test]
    fn frame_without_data_defaults_to_null() {
        let frame = Frame::from_bytes(br#"{"event":"connect"}"#).unwrap();
        assert_eq!(frame.kind(), FrameKind::Connect);
        assert_eq!(frame.data, Value::Null);
    }

    #[test]
    fn frame_kind_is_case_insensitive() {
        assert_eq!(Frame::new("STATUS", json!({})).kind(), FrameKind::Status);
        assert_eq!(
            Frame::new("confirm", json!({})).kind(),
            FrameKind::Other("confirm".into())
        );
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(Frame::from_bytes(b"not json").is_err());
        assert!(Frame::from_bytes(br#"["status", {}]"#).is_err());
    }

    #[test]
    fn positional_array_frame_is_rejected() {
        let err = Frame::from_bytes(br#"["status", {"command":"copy","status":"running"}]"#)
            .unwrap_err();
        assert!(matches!(err, WireError::NotAnObject("array")));
        assert!(matches!(
            Frame::from_bytes(b"\"status\""),
            Err(WireError::NotAnObject("string"))
        ));
    }

    #[test]
    fn ack_frame_round_trips_payload() {
        let frame = Frame::ack(ACK_OK);
        let back = Frame::from_bytes(&frame.to_bytes().unwrap()).unwrap();
        assert_eq!(back.kind(), FrameKind::Ack);
        assert_eq!(back.data, json!("ok"));
    }

    #[test]
    fn timestamp_is_seconds_since_epoch() {
        let at = UNIX_EPOCH + Duration::from_millis(1_500);
        assert_eq!(unix_timestamp(at), 1.5);
    }
}
