//! # xfer-types
//!
//! Wire format types for the xferlink transfer-status protocol.
//!
//! This crate provides the foundational types used across all xferlink crates:
//! - [`SourceId`] - Stable identity of a remote source location
//! - [`OperationKind`], [`OperationStatus`] - Open enums for the `command`/`status` fields
//! - [`Frame`] - The `{event, data}` envelope carried over the connection
//! - [`StatusEvent`], [`DeviceFields`] - Typed view of a loosely-shaped status push
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frame;
mod ids;
mod kinds;
mod lenient;
mod status;

pub use error::WireError;
pub use frame::{unix_timestamp, Frame, FrameKind, ACK_OK};
pub use ids::SourceId;
pub use kinds::{OperationKind, OperationStatus};
pub use status::{DeviceFields, StatusEvent, StatusShape};
