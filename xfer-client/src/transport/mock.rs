//! Mock transport for testing.
//!
//! Frames pushed with [`MockTransport::push_event`] come back out of `recv()`
//! in order, and every sent frame is captured for verification. Clones share
//! state, so a test keeps one handle while the client owns another.

use super::{Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use xferlink_types::{Frame, FrameKind};

type Inbound = Result<Vec<u8>, TransportError>;

/// Mock transport for testing.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Inbound>>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    connect_calls: usize,
    sent_messages: Vec<Vec<u8>>,
    auto_ack: Option<Value>,
    stall_sends: bool,
    connect_delay: Option<Duration>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl Default for MockTransport {
    fn default() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner::default())),
            inbound_tx,
            inbound_rx: Arc::new(AsyncMutex::new(inbound_rx)),
        }
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an inbound frame with the given event name and payload.
    pub fn push_event(&self, event: &str, data: Value) {
        let item = Frame::new(event, data)
            .to_bytes()
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()));
        let _ = self.inbound_tx.send(item);
    }

    /// Queue an inbound `status` push.
    pub fn push_status(&self, data: Value) {
        let item = Frame::status(data)
            .to_bytes()
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()));
        let _ = self.inbound_tx.send(item);
    }

    /// Queue raw inbound bytes, e.g. a malformed frame.
    pub fn push_raw(&self, bytes: Vec<u8>) {
        let _ = self.inbound_tx.send(Ok(bytes));
    }

    /// Make the next `recv()` fail as if the server went away.
    pub fn simulate_drop(&self, reason: &str) {
        let _ = self
            .inbound_tx
            .send(Err(TransportError::ReceiveFailed(reason.to_string())));
    }

    /// Answer every sent command frame with an `ack` carrying `value`.
    /// `None` stops acknowledging.
    pub fn ack_sends_with(&self, value: Option<Value>) {
        self.inner().auto_ack = value;
    }

    /// While set, `send()` records the frame and then never completes, like a
    /// peer that stopped reading.
    pub fn stall_sends(&self, stall: bool) {
        self.inner().stall_sends = stall;
    }

    /// Delay every `connect()` by `delay`.
    pub fn delay_connect(&self, delay: Duration) {
        self.inner().connect_delay = Some(delay);
    }

    /// Get all messages that were sent.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        self.inner().sent_messages.clone()
    }

    /// Sent messages decoded as frames. Undecodable ones are skipped.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.inner()
            .sent_messages
            .iter()
            .filter_map(|bytes| Frame::from_bytes(bytes).ok())
            .collect()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        self.inner().connected_address.clone()
    }

    /// How many times `connect()` was called.
    pub fn connect_calls(&self) -> usize {
        self.inner().connect_calls
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.inner().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.inner().fail_next_send = Some(error.to_string());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let delay = {
            let mut inner = self.inner();
            inner.connect_calls += 1;

            // Check for forced failure
            if let Some(error) = inner.fail_next_connect.take() {
                return Err(TransportError::ConnectionFailed(error));
            }
            inner.connect_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner();
        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let ack = {
            let mut inner = self.inner();

            if !inner.connected {
                return Err(TransportError::NotConnected);
            }

            // Check for forced failure
            if let Some(error) = inner.fail_next_send.take() {
                return Err(TransportError::SendFailed(error));
            }

            inner.sent_messages.push(data.to_vec());
            if inner.stall_sends {
                None
            } else {
                Some(inner.auto_ack.clone())
            }
        };

        let Some(ack) = ack else {
            return std::future::pending().await;
        };

        if let Some(value) = ack {
            let is_command = Frame::from_bytes(data)
                .map(|frame| frame.kind() == FrameKind::Message)
                .unwrap_or(false);
            if is_command {
                self.push_event("ack", value);
            }
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let connected = self.inner().connected;
        if !connected {
            return Err(TransportError::NotConnected);
        }

        let item = {
            let mut inbound = self.inbound_rx.lock().await;
            inbound
                .recv()
                .await
                .unwrap_or(Err(TransportError::ConnectionClosed))
        };
        if item.is_err() {
            self.inner().connected = false;
        }
        item
    }

    fn is_connected(&self) -> bool {
        self.inner().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner().connected = false;
        Ok(())
    }
}
