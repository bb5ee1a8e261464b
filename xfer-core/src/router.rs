//! Event router: raw inbound frame → typed event or acknowledgment.
//!
//! The router performs no business interpretation. It checks that the frame is
//! a well-formed `{event, data}` object, classifies it by event name, and for
//! status pushes decodes the loosely-typed payload into a [`StatusEvent`].
//! Anything it cannot decode comes back as a [`RouteError`]; the caller logs
//! and drops it.

use serde_json::Value;
use thiserror::Error;
use xferlink_types::{Frame, FrameKind, StatusEvent, WireError};

/// A typed inbound event, ready for the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The connection is up.
    Connected,
    /// The connection is gone (requested or not).
    Disconnected {
        /// Why, when known.
        reason: Option<String>,
    },
    /// Server- or transport-reported error.
    Error {
        /// Error description.
        message: String,
    },
    /// Free-text message for display.
    Message {
        /// Message text.
        text: String,
    },
    /// Status push.
    Status(StatusEvent),
}

/// Result of routing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// An event for the reconciler.
    Event(InboundEvent),
    /// An acknowledgment for the command dispatcher, payload unopened.
    Ack(Value),
}

/// Why a frame was not routed.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The bytes are not a decodable frame, or the payload does not fit the
    /// event it claims to be.
    #[error("malformed payload: {0}")]
    Malformed(#[from] WireError),

    /// The frame names an event this client does not handle.
    #[error("unrecognized event '{0}'")]
    UnknownEvent(String),
}

/// Route raw frame bytes.
pub fn route(bytes: &[u8]) -> Result<Routed, RouteError> {
    let frame = Frame::from_bytes(bytes)?;
    route_frame(frame)
}

/// Route an already-decoded frame.
pub fn route_frame(frame: Frame) -> Result<Routed, RouteError> {
    let kind = frame.kind();
    // Some servers wrap the payload in a one-element argument list.
    let data = unwrap_argument_list(frame.data);

    let event = match kind {
        FrameKind::Ack => return Ok(Routed::Ack(data)),
        FrameKind::Connect => InboundEvent::Connected,
        FrameKind::Disconnect => InboundEvent::Disconnected {
            reason: text_of(&data),
        },
        FrameKind::Error => InboundEvent::Error {
            message: text_of(&data)
                .or_else(|| data.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| "server reported an error".to_string()),
        },
        FrameKind::Message => match data {
            Value::String(text) => InboundEvent::Message { text },
            other => {
                return Err(invalid(&frame.event, "message payload must be a string", &other));
            }
        },
        FrameKind::Status => InboundEvent::Status(StatusEvent::from_value(data)?),
        FrameKind::Other(name) => return Err(RouteError::UnknownEvent(name)),
    };

    Ok(Routed::Event(event))
}

fn unwrap_argument_list(data: Value) -> Value {
    match data {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

fn text_of(data: &Value) -> Option<String> {
    data.as_str().map(str::to_string)
}

fn invalid(event: &str, reason: &str, data: &Value) -> RouteError {
    RouteError::Malformed(WireError::InvalidPayload {
        event: event.to_string(),
        reason: format!("{reason} (got {data})"),
    })
}
