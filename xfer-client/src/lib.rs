//! # xfer-client
//!
//! Client library for the xferlink transfer-status protocol.
//!
//! This is the main library that applications use to follow copy/erase/detect
//! operations running on a remote transfer server and to start or cancel them.
//!
//! ## Features
//!
//! - **Live snapshots**: every status push is merged into per-device records
//!   and published on a watch channel
//! - **Acknowledged commands**: one command in flight, bounded ack wait
//! - **Transport Abstraction**: Pluggable transport layer (WebSocket, mock)
//! - **Pure State Machine**: Uses xfer-core for side-effect-free logic
//!
//! ## Logging
//!
//! Diagnostics are emitted with `tracing`. The library installs no
//! subscriber; the embedding application decides where they go.
//!
//! ## Example
//!
//! ```ignore
//! use xferlink_client::{ClientConfig, TransferClient};
//!
//! let config = ClientConfig::load(Path::new("xferlink.toml"))?;
//! let client = TransferClient::websocket(config);
//!
//! client.connect().await?;
//! client.detect().await?;
//! client.copy().await?;
//!
//! let snapshot = client.snapshot();
//! for record in &snapshot.records {
//!     println!("{}: {:.0}%", record.id, record.overall_progress);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod channel;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod transport;

pub use client::{ClientError, TransferClient};
pub use config::{ClientConfig, ConfigError};
pub use dispatcher::{CommandError, DEFAULT_ACK_TIMEOUT};
pub use transport::{MockTransport, Transport, TransportError, WebSocketTransport};

pub use xferlink_core::{
    format_duration, format_size, ConnectionState, InboundEvent, ResetPolicy, SelectionView,
    Snapshot, TransferRecord,
};
pub use xferlink_types::{OperationKind, OperationStatus, SourceId};
