//! Transport abstraction for xferlink.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying connection mechanism (WebSocket, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection
//! - `send()` transmits one encoded frame
//! - `recv()` waits for the next inbound frame
//! - `close()` gracefully terminates
//!
//! `send()` and `recv()` are called concurrently (commands go out while the
//! reader task waits for pushes), so implementations must not hold one lock
//! across both directions.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.connect("ws://127.0.0.1:1337").await?;
//! transport.send(frame_bytes).await?;
//! let push = transport.recv().await?;
//! ```

mod mock;
mod websocket;

pub use mock::MockTransport;
pub use websocket::WebSocketTransport;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server address could not be used.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// TCP or TLS setup failed before the upgrade.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server answered the upgrade request with a non-101 status.
    #[error("websocket upgrade rejected with HTTP {0}")]
    HandshakeRejected(u16),

    /// The connect did not finish in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("not connected")]
    NotConnected,

    /// The peer closed the socket or sent a close frame.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Transport trait for exchanging frames with the transfer server.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connect to the server at the given address.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one frame.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame.
    ///
    /// Blocks until data is available or the connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
