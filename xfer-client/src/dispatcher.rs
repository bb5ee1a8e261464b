//! Command dispatcher: one command in flight, one acknowledgment back.
//!
//! The server does not echo a request id in its acks, so an ack belongs to
//! whichever command is waiting. Only one command may wait at a time; a second
//! concurrent caller is turned away with [`CommandError::CommandInFlight`].
//!
//! The waiting slot is owned by a [`SlotGuard`]. Dropping the guard (success,
//! timeout, error or a cancelled caller future) frees the slot, so no exit
//! path can leave it occupied.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::transport::TransportError;

/// Default time to wait for an acknowledgment.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The channel is not connected; nothing was sent.
    #[error("not connected")]
    NotConnected,

    /// Another command is still waiting for its acknowledgment.
    #[error("another command is awaiting acknowledgment")]
    CommandInFlight,

    /// No acknowledgment arrived in time.
    #[error("no acknowledgment within {0:?}")]
    CommandTimeout(Duration),

    /// The server answered with something other than `"ok"`.
    #[error("command rejected: {0}")]
    CommandRejected(String),

    /// The connection closed while waiting.
    #[error("channel closed")]
    ChannelClosed,

    /// Transport error while sending.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The command frame could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

struct Pending {
    id: u64,
    reply: oneshot::Sender<Value>,
}

/// Single-slot acknowledgment correlator.
pub struct Dispatcher {
    slot: Mutex<Option<Pending>>,
    next_id: AtomicU64,
    ack_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with the given acknowledgment timeout.
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
            ack_timeout,
        }
    }

    /// How long a command waits for its acknowledgment.
    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    fn slot(&self) -> MutexGuard<'_, Option<Pending>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot. Fails with `CommandInFlight` if it is taken.
    pub fn begin(&self) -> Result<(SlotGuard<'_>, oneshot::Receiver<Value>), CommandError> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Err(CommandError::CommandInFlight);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();
        *slot = Some(Pending { id, reply });
        Ok((
            SlotGuard {
                dispatcher: self,
                id,
            },
            receiver,
        ))
    }

    /// Hand an acknowledgment to the waiting command.
    ///
    /// Returns `false` when nothing was waiting; the ack is dropped.
    pub fn resolve(&self, ack: Value) -> bool {
        let pending = self.slot().take();
        match pending {
            Some(pending) => {
                debug!(command_id = pending.id, %ack, "acknowledgment received");
                // The waiter may have given up already.
                let _ = pending.reply.send(ack);
                true
            }
            None => {
                warn!(%ack, "dropping unsolicited acknowledgment");
                false
            }
        }
    }

    /// Fail the waiting command, if any, with "channel closed".
    pub fn fail_pending(&self) {
        if let Some(pending) = self.slot().take() {
            debug!(command_id = pending.id, "failing pending command: channel closed");
        }
    }

    /// Whether a command is waiting.
    pub fn is_busy(&self) -> bool {
        self.slot().is_some()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("busy", &self.is_busy())
            .field("ack_timeout", &self.ack_timeout)
            .finish()
    }
}

/// Frees the dispatcher slot when dropped, unless a newer command owns it.
pub struct SlotGuard<'a> {
    dispatcher: &'a Dispatcher,
    id: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.dispatcher.slot();
        if slot.as_ref().is_some_and(|pending| pending.id == self.id) {
            *slot = None;
        }
    }
}

/// Interpret an acknowledgment payload: `"ok"` is success, anything else is
/// a rejection carrying the payload as text.
pub fn expect_ok(ack: Value) -> Result<(), CommandError> {
    match ack {
        Value::String(text) if text == xferlink_types::ACK_OK => Ok(()),
        Value::String(text) => Err(CommandError::CommandRejected(text)),
        other => Err(CommandError::CommandRejected(other.to_string())),
    }
}
