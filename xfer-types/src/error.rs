//! Error types for the xferlink wire format.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Frame bytes were not a JSON document of the expected shape
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Frame bytes were valid JSON but not an object
    #[error("frame must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    /// Frame decoded but its payload does not match the event it claims to be
    #[error("invalid payload for '{event}': {reason}")]
    InvalidPayload {
        /// Event name carried by the frame.
        event: String,
        /// What was wrong with the payload.
        reason: String,
    },
}
