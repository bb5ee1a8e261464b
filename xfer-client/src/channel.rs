//! Connection channel: runs the xfer-core connection machine against a real
//! transport.
//!
//! Every lifecycle change goes through [`ConnectionState::on_event`] under the
//! state lock, and the returned actions run before the lock is released, so a
//! user disconnect and a transport drop can never interleave their effects.
//! The one exception is the transport connect itself, which runs unlocked so
//! that `send()` and `disconnect()` stay responsive while it is in flight.

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};
use xferlink_core::{route, Action, ConnectionState, Event, InboundEvent, RouteError, Routed};
use xferlink_types::{unix_timestamp, Frame, OperationKind};

use crate::dispatcher::{CommandError, Dispatcher};
use crate::transport::{Transport, TransportError};

/// Input to the client's event loop.
#[derive(Debug)]
pub(crate) enum LoopInput {
    /// A routed or synthetic event for the reconciler.
    Event(InboundEvent),
    /// Connection state change that has no event of its own.
    Connection(ConnectionState),
    /// Caller cleared the error message.
    ClearError,
    /// The server accepted a command.
    CommandAccepted(OperationKind),
}

/// Shared between the channel handle and its reader task.
pub(crate) struct Channel<T: Transport> {
    transport: T,
    address: String,
    connect_timeout: Duration,
    state: Mutex<ConnectionState>,
    dispatcher: Dispatcher,
    reader: StdMutex<Option<(u64, JoinHandle<()>)>>,
    reader_generation: AtomicU64,
    events: mpsc::Sender<LoopInput>,
}

impl<T: Transport> Channel<T> {
    pub(crate) fn new(
        transport: T,
        address: String,
        connect_timeout: Duration,
        ack_timeout: Duration,
        events: mpsc::Sender<LoopInput>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            address,
            connect_timeout,
            state: Mutex::new(ConnectionState::new()),
            dispatcher: Dispatcher::new(ack_timeout),
            reader: StdMutex::new(None),
            reader_generation: AtomicU64::new(0),
            events,
        })
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Open the connection. A no-op when already connected or connecting.
    pub(crate) async fn connect(self: &Arc<Self>) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock().await;
            let actions = self.step(&mut state, Event::ConnectRequested);
            if !actions.contains(&Action::OpenTransport) {
                debug!(state = ?*state, "connect ignored");
                return Ok(());
            }
            info!(address = %self.address, "connecting");
            self.forward(LoopInput::Connection(*state)).await;
        }

        let result = match timeout(self.connect_timeout, self.transport.connect(&self.address)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout(self.connect_timeout)),
        };

        let mut state = self.state.lock().await;
        if !state.is_connecting() {
            // disconnect() ran while the transport was connecting
            if result.is_ok() {
                let _ = self.transport.close().await;
            }
            return Err(TransportError::ConnectionClosed);
        }

        match result {
            Ok(()) => {
                let actions = self.step(&mut state, Event::ConnectSucceeded);
                self.execute(actions).await;
                Ok(())
            }
            Err(error) => {
                warn!(address = %self.address, %error, "connect failed");
                let actions = self.step(
                    &mut state,
                    Event::ConnectFailed {
                        error: error.to_string(),
                    },
                );
                self.execute(actions).await;
                self.forward(LoopInput::Connection(*state)).await;
                Err(error)
            }
        }
    }

    /// Close the connection. Always permitted; a no-op when disconnected.
    pub(crate) async fn disconnect(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        let actions = self.step(&mut state, Event::DisconnectRequested);
        self.execute(actions).await;
    }

    /// Send a command and wait for its acknowledgment.
    ///
    /// The ack payload is returned unopened.
    pub(crate) async fn request(
        &self,
        command: &str,
        payload: Map<String, Value>,
    ) -> Result<Value, CommandError> {
        if !self.state().await.is_connected() {
            return Err(CommandError::NotConnected);
        }

        let (_slot, mut reply) = self.dispatcher.begin()?;

        // A disconnect between the first check and claiming the slot would
        // not have seen this command.
        if !self.state().await.is_connected() {
            return Err(CommandError::NotConnected);
        }

        let frame = Frame::command(command, unix_timestamp(SystemTime::now()), payload);
        let bytes = frame
            .to_bytes()
            .map_err(|e| CommandError::Serialization(e.to_string()))?;

        debug!(command, "sending command");
        let ack_timeout = self.dispatcher.ack_timeout();

        // The send and the wait for its ack share one deadline. A disconnect
        // fails the reply, which also abandons a send that is still stuck.
        let exchange = async {
            tokio::select! {
                sent = self.transport.send(&bytes) => {
                    if let Err(error) = sent {
                        return Err(CommandError::from(error));
                    }
                    (&mut reply).await.map_err(|_| CommandError::ChannelClosed)
                }
                early = &mut reply => early.map_err(|_| CommandError::ChannelClosed),
            }
        };

        match timeout(ack_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(command, timeout = ?ack_timeout, "command timed out");
                Err(CommandError::CommandTimeout(ack_timeout))
            }
        }
    }

    /// Stop the reader without going through the state machine. Used when the
    /// client is dropped.
    pub(crate) fn shutdown(&self) {
        if let Some((_, handle)) = self.reader().take() {
            handle.abort();
        }
    }

    fn step(&self, state: &mut ConnectionState, event: Event) -> Vec<Action> {
        let (next, actions) = state.on_event(event);
        if next != *state {
            info!(from = ?*state, to = ?next, "connection state changed");
        }
        *state = next;
        actions
    }

    /// Run actions. Callers hold the state lock.
    async fn execute(self: &Arc<Self>, actions: Vec<Action>) {
        for action in actions {
            match action {
                // Handled inline by connect()
                Action::OpenTransport => {}
                Action::StartReader => self.start_reader(),
                Action::FailPendingAck => self.dispatcher.fail_pending(),
                Action::CloseTransport => {
                    self.shutdown();
                    match timeout(self.connect_timeout, self.transport.close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => warn!(%error, "error closing transport"),
                        Err(_) => warn!(timeout = ?self.connect_timeout, "transport close timed out"),
                    }
                }
                Action::Emit(event) => self.forward(LoopInput::Event(event)).await,
            }
        }
    }

    async fn forward(&self, input: LoopInput) {
        if self.events.send(input).await.is_err() {
            debug!("event loop gone, dropping input");
        }
    }

    fn reader(&self) -> MutexGuard<'_, Option<(u64, JoinHandle<()>)>> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_reader(self: &Arc<Self>) {
        let generation = self.reader_generation.fetch_add(1, Ordering::Relaxed) + 1;
        // Hold the slot while spawning so the task cannot look for its own
        // handle before it is stored.
        let mut slot = self.reader();
        if let Some((_, stale)) = slot.take() {
            stale.abort();
        }
        let channel = Arc::clone(self);
        let handle = tokio::spawn(
            async move { channel.read_loop(generation).await }.in_current_span(),
        );
        *slot = Some((generation, handle));
    }

    /// Detach this reader's handle. `false` if another reader has replaced it
    /// or a disconnect already removed it.
    fn release_reader(&self, generation: u64) -> bool {
        let mut slot = self.reader();
        match slot.as_ref() {
            Some((owner, _)) if *owner == generation => {
                slot.take();
                true
            }
            _ => false,
        }
    }

    async fn read_loop(self: Arc<Self>, generation: u64) {
        debug!(generation, "reader started");
        let reason = loop {
            let bytes = match self.transport.recv().await {
                Ok(bytes) => bytes,
                Err(error) => break error.to_string(),
            };

            match route(&bytes) {
                Ok(Routed::Ack(ack)) => {
                    self.dispatcher.resolve(ack);
                }
                Ok(Routed::Event(InboundEvent::Disconnected { reason })) => {
                    break reason.unwrap_or_else(|| "server closed the session".to_string());
                }
                Ok(Routed::Event(event)) => self.forward(LoopInput::Event(event)).await,
                Err(RouteError::UnknownEvent(name)) => {
                    warn!(event = %name, "dropping frame with unrecognized event");
                }
                Err(error) => {
                    warn!(%error, len = bytes.len(), "dropping malformed frame");
                }
            }
        };

        if !self.release_reader(generation) {
            return;
        }
        warn!(%reason, "transport dropped");
        let mut state = self.state.lock().await;
        let actions = self.step(&mut state, Event::TransportDropped { reason });
        self.execute(actions).await;
    }
}
