//! Connection state machine for xferlink.
//!
//! This module provides a pure, side-effect-free state machine for managing
//! the connection lifecycle. The state machine takes events as input and
//! produces a new state plus a list of actions to execute.
//!
//! The actual I/O (opening the socket, failing the pending acknowledgment) is
//! performed by xfer-client, not by this module.
//!
//! There is no reconnecting state: a dropped connection lands in
//! `Disconnected` and the caller decides whether to connect again.

use serde::Serialize;

use crate::router::InboundEvent;

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Transport connection in progress.
    Connecting,
    /// Transport confirmed the connection.
    Connected,
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (xfer-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Disconnected
            (Self::Disconnected, Event::ConnectRequested) => {
                (Self::Connecting, vec![Action::OpenTransport])
            }

            // From Connecting
            (Self::Connecting, Event::ConnectSucceeded) => (
                Self::Connected,
                vec![
                    Action::StartReader,
                    Action::Emit(InboundEvent::Connected),
                ],
            ),
            (Self::Connecting, Event::ConnectFailed { .. }) => (Self::Disconnected, vec![]),
            (Self::Connecting, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::CloseTransport,
                    Action::Emit(InboundEvent::Disconnected {
                        reason: Some("user requested".into()),
                    }),
                ],
            ),

            // From Connected
            (Self::Connected, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::FailPendingAck,
                    Action::CloseTransport,
                    Action::Emit(InboundEvent::Disconnected {
                        reason: Some("user requested".into()),
                    }),
                ],
            ),
            (Self::Connected, Event::TransportDropped { reason }) => (
                Self::Disconnected,
                vec![
                    Action::FailPendingAck,
                    Action::CloseTransport,
                    Action::Emit(InboundEvent::Disconnected {
                        reason: Some(reason),
                    }),
                ],
            ),

            // Already where the caller wants to be, or an event that no longer
            // applies (e.g. a late drop after a user disconnect).
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a connection attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller asked to connect.
    ConnectRequested,
    /// Transport confirmed the connection.
    ConnectSucceeded,
    /// Transport connection failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Caller asked to disconnect.
    DisconnectRequested,
    /// The transport closed without being asked to.
    TransportDropped {
        /// Reason reported by the transport.
        reason: String,
    },
}

/// Actions to be executed by the xfer-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Open the transport connection.
    OpenTransport,
    /// Close the transport.
    CloseTransport,
    /// Start the task that reads inbound frames.
    StartReader,
    /// Resolve any outstanding acknowledgment wait as "channel closed".
    FailPendingAck,
    /// Deliver an event to the reconciler.
    Emit(InboundEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted(actions: &[Action]) -> Vec<&InboundEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Emit(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn starts_disconnected() {
        let state = ConnectionState::new();
        assert!(matches!(state, ConnectionState::Disconnected));
    }

    #[test]
    fn connect_request_transitions_to_connecting() {
        let (state, actions) = ConnectionState::Disconnected.on_event(Event::ConnectRequested);

        assert_eq!(state, ConnectionState::Connecting);
        assert_eq!(actions, vec![Action::OpenTransport]);
    }

    #[test]
    fn connect_success_starts_reader_and_emits_connected() {
        let (state, actions) = ConnectionState::Connecting.on_event(Event::ConnectSucceeded);

        assert_eq!(state, ConnectionState::Connected);
        assert!(actions.contains(&Action::StartReader));
        assert_eq!(emitted(&actions), vec![&InboundEvent::Connected]);
    }

    #[test]
    fn connect_is_idempotent() {
        let (state, actions) = ConnectionState::Connected.on_event(Event::ConnectRequested);
        assert_eq!(state, ConnectionState::Connected);
        assert!(actions.is_empty());

        let (state, actions) = ConnectionState::Connecting.on_event(Event::ConnectRequested);
        assert_eq!(state, ConnectionState::Connecting);
        assert!(actions.is_empty());
    }

    #[test]
    fn connect_failure_returns_to_disconnected_without_retry() {
        let (state, actions) = ConnectionState::Connecting.on_event(Event::ConnectFailed {
            error: "refused".into(),
        });

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(!actions.contains(&Action::OpenTransport));
    }

    #[test]
    fn disconnect_from_connected_fails_pending_ack() {
        let (state, actions) = ConnectionState::Connected.on_event(Event::DisconnectRequested);

        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(actions[0], Action::FailPendingAck);
        assert!(actions.contains(&Action::CloseTransport));
        assert!(matches!(
            emitted(&actions)[..],
            [InboundEvent::Disconnected { .. }]
        ));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (state, actions) = ConnectionState::Disconnected.on_event(Event::DisconnectRequested);
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn disconnect_while_connecting_closes_transport() {
        let (state, actions) = ConnectionState::Connecting.on_event(Event::DisconnectRequested);
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.contains(&Action::CloseTransport));
    }

    #[test]
    fn unexpected_drop_emits_synthetic_disconnect() {
        let (state, actions) = ConnectionState::Connected.on_event(Event::TransportDropped {
            reason: "connection reset".into(),
        });

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.contains(&Action::FailPendingAck));
        assert_eq!(
            emitted(&actions),
            vec![&InboundEvent::Disconnected {
                reason: Some("connection reset".into())
            }]
        );
    }

    #[test]
    fn late_drop_after_disconnect_is_ignored() {
        let (state, actions) = ConnectionState::Disconnected.on_event(Event::TransportDropped {
            reason: "eof".into(),
        });
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn state_helpers() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(!ConnectionState::Disconnected.is_connecting());
    }
}
