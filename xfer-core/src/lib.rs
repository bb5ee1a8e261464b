//! # xfer-core
//!
//! Pure logic for xferlink (no I/O, instant tests).
//!
//! This crate implements the state machines that turn a stream of inbound
//! frames into a consistent view of remote transfers, without any network
//! I/O and without reading a clock.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (socket, timers) is performed by `xfer-client`, which
//! interprets the actions produced by the connection machine and feeds routed
//! events into the [`StatusReconciler`] from a single task.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod reconciler;
pub mod record;
pub mod router;
pub mod view;

pub use connection::{Action, ConnectionState, Event};
pub use reconciler::{ResetPolicy, Snapshot, StatusReconciler, DEFAULT_MESSAGE_LOG_CAPACITY};
pub use record::{clamp_percent, estimate_remaining, TransferRecord};
pub use router::{route, route_frame, InboundEvent, RouteError, Routed};
pub use view::{elapsed_between, format_duration, format_size, SelectionView};
