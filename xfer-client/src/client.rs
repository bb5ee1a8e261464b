//! TransferClient - the main interface for xferlink.
//!
//! This module provides [`TransferClient`], the API applications use to
//! follow and drive transfers on a remote server.
//!
//! # Architecture
//!
//! The client interprets the pure connection machine from xfer-core to do the
//! actual I/O, and feeds every inbound event through one event-loop task that
//! owns the [`StatusReconciler`]. Each applied event publishes a fresh
//! [`Snapshot`] on a watch channel.
//!
//! ```text
//! Transport → reader task → router ─┬─ ack ──→ Dispatcher → send() caller
//!                                   └─ event → event loop → Reconciler → watch<Snapshot>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use xferlink_client::{ClientConfig, TransferClient};
//!
//! let config = ClientConfig::new("ws://192.168.0.10:1337")?;
//! let client = TransferClient::websocket(config);
//!
//! client.connect().await?;
//! client.detect().await?;
//!
//! let mut updates = client.subscribe();
//! while updates.changed().await.is_ok() {
//!     let snapshot = updates.borrow().clone();
//!     println!("{:.0}%", snapshot.aggregate_progress());
//! }
//! ```

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;
use xferlink_core::{ConnectionState, Snapshot, StatusReconciler};
use xferlink_types::OperationKind;

use crate::channel::{Channel, LoopInput};
use crate::config::{ClientConfig, ConfigError};
use crate::dispatcher::{expect_ok, CommandError};
use crate::transport::{Transport, TransportError, WebSocketTransport};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// The main transfer client.
///
/// Must be created inside a Tokio runtime; it spawns its event loop on
/// construction.
pub struct TransferClient<T: Transport> {
    config: ClientConfig,
    channel: Arc<Channel<T>>,
    inputs: mpsc::Sender<LoopInput>,
    snapshots: watch::Receiver<Snapshot>,
    event_loop: JoinHandle<()>,
}

impl TransferClient<WebSocketTransport> {
    /// Create a client that talks WebSocket to `config.server_url`.
    pub fn websocket(config: ClientConfig) -> Self {
        Self::new(config, WebSocketTransport::new())
    }
}

impl<T: Transport> TransferClient<T> {
    /// Create a new TransferClient over the given transport.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let (inputs, queue) = mpsc::channel(config.event_queue_capacity.max(1));
        let reconciler = StatusReconciler::new()
            .with_policy(config.reset_policy)
            .with_message_capacity(config.message_log_capacity);
        let (publisher, snapshots) = watch::channel(reconciler.snapshot().clone());

        let event_loop = tokio::spawn(run_event_loop(reconciler, queue, publisher));
        let channel = Channel::new(
            transport,
            config.server_url.clone(),
            config.connect_timeout(),
            config.ack_timeout(),
            inputs.clone(),
        );

        Self {
            config,
            channel,
            inputs,
            snapshots,
            event_loop,
        }
    }

    /// Connect to the server.
    ///
    /// Returns immediately when already connected or connecting. A failed
    /// attempt is reported here and not retried.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.channel.connect().await?;
        Ok(())
    }

    /// Disconnect from the server. Any command waiting for its
    /// acknowledgment fails with [`CommandError::ChannelClosed`].
    pub async fn disconnect(&self) {
        self.channel.disconnect().await;
    }

    /// Check if connected.
    pub async fn is_connected(&self) -> bool {
        self.channel.state().await.is_connected()
    }

    /// Current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.channel.state().await
    }

    /// Send a named command with extra payload fields and wait for the
    /// acknowledgment, which is returned unopened.
    pub async fn send(
        &self,
        command: &str,
        payload: Map<String, Value>,
    ) -> Result<Value, CommandError> {
        self.channel.request(command, payload).await
    }

    /// Start copying from the detected devices.
    pub async fn copy(&self) -> Result<(), CommandError> {
        self.run(OperationKind::Copy).await
    }

    /// Start erasing the detected devices.
    pub async fn erase(&self) -> Result<(), CommandError> {
        self.run(OperationKind::Erase).await
    }

    /// Ask the server to enumerate mounted devices.
    pub async fn detect(&self) -> Result<(), CommandError> {
        self.run(OperationKind::Detect).await
    }

    /// Cancel the running operation.
    pub async fn abort(&self) -> Result<(), CommandError> {
        self.run(OperationKind::Abort).await
    }

    /// Ask the server to re-send its current status.
    pub async fn refresh(&self) -> Result<(), CommandError> {
        let ack = self.send("refresh", Map::new()).await?;
        expect_ok(ack)
    }

    async fn run(&self, kind: OperationKind) -> Result<(), CommandError> {
        let ack = self.send(kind.as_str(), Map::new()).await?;
        expect_ok(ack)?;
        self.push(LoopInput::CommandAccepted(kind)).await;
        Ok(())
    }

    /// Clear the error message. Errors stay until cleared.
    pub async fn clear_error(&self) {
        self.push(LoopInput::ClearError).await;
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every applied event.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        self.channel.transport()
    }

    async fn push(&self, input: LoopInput) {
        if self.inputs.send(input).await.is_err() {
            debug!("event loop gone, dropping input");
        }
    }
}

impl<T: Transport> Drop for TransferClient<T> {
    fn drop(&mut self) {
        self.channel.shutdown();
        self.event_loop.abort();
    }
}

/// Single consumer: applies inputs in arrival order and publishes the result.
async fn run_event_loop(
    mut reconciler: StatusReconciler,
    mut queue: mpsc::Receiver<LoopInput>,
    publisher: watch::Sender<Snapshot>,
) {
    while let Some(input) = queue.recv().await {
        let snapshot = match input {
            LoopInput::Event(event) => reconciler.apply(event, SystemTime::now()),
            LoopInput::Connection(state) => reconciler.set_connection(state),
            LoopInput::ClearError => reconciler.clear_error(),
            LoopInput::CommandAccepted(kind) => reconciler.note_command_accepted(&kind),
        };
        publisher.send_replace(snapshot);
    }
    debug!("event loop stopped");
}
