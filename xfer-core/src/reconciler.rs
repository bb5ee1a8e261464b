//! Status reconciler: the single owner of transfer state.
//!
//! Applies routed events one at a time and hands back an immutable
//! [`Snapshot`] after each one. Transition rules are order-dependent, so the
//! reconciler must be driven from one consumer; it holds no locks itself.
//!
//! Aggregate lifecycle: `Idle → Running → {Verifying → Done | Abort | Error} → Idle`.
//! Detect runs beside it: it replaces the device set on completion but never
//! moves the aggregate transfer status.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use xferlink_types::{OperationKind, OperationStatus, SourceId, StatusEvent, StatusShape};

use crate::connection::ConnectionState;
use crate::record::TransferRecord;
use crate::router::InboundEvent;

/// Default number of free-text messages kept in [`Snapshot::message_log`].
pub const DEFAULT_MESSAGE_LOG_CAPACITY: usize = 50;

/// What happens to device records when the connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Keep the last known records for display; the next detect replaces them.
    #[default]
    OnNextDetect,
    /// Drop all records as soon as the disconnect is applied.
    OnDisconnect,
}

/// Immutable view of everything the reconciler knows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Connection state as last reported by the channel.
    pub connection: ConnectionState,
    /// Aggregate transfer status.
    pub status: OperationStatus,
    /// Display text for the aggregate status.
    pub status_message: String,
    /// Whether a transfer is running on the server.
    pub is_operation_in_progress: bool,
    /// Whether a detect is running.
    pub is_detecting: bool,
    /// Most recently observed operation other than detect.
    pub active_operation_kind: Option<OperationKind>,
    /// Device records in insertion order.
    pub records: Vec<TransferRecord>,
    /// Last free-text message from the server.
    pub last_message: Option<String>,
    /// Recent free-text messages, oldest first.
    pub message_log: Vec<String>,
    /// Last reported error; stays until cleared.
    pub error_message: Option<String>,
    /// Mounted device count as reported by the server.
    pub mount_count: Option<u64>,
    /// When the aggregate entered `Running`.
    pub operation_started_at: Option<SystemTime>,
    /// Incremented on every change.
    pub revision: u64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            status: OperationStatus::Idle,
            status_message: OperationStatus::Idle.display_message().to_string(),
            is_operation_in_progress: false,
            is_detecting: false,
            active_operation_kind: None,
            records: Vec::new(),
            last_message: None,
            message_log: Vec::new(),
            error_message: None,
            mount_count: None,
            operation_started_at: None,
            revision: 0,
        }
    }
}

impl Snapshot {
    /// Number of device records.
    pub fn devices_connected_count(&self) -> usize {
        self.records.len()
    }

    /// Mean folder-level progress across records; 0 with no records.
    pub fn aggregate_progress(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let total: f64 = self.records.iter().map(|r| r.overall_progress).sum();
        total / self.records.len() as f64
    }

    /// Look up a record by id.
    pub fn record(&self, id: &SourceId) -> Option<&TransferRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Whether the connection is up.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Time since the operation started, or zero when nothing is running.
    pub fn elapsed_since_start(&self, now: SystemTime) -> Duration {
        self.operation_started_at
            .map(|start| crate::view::elapsed_between(start, now))
            .unwrap_or_default()
    }
}

/// Applies events to the snapshot.
#[derive(Debug, Clone)]
pub struct StatusReconciler {
    state: Snapshot,
    policy: ResetPolicy,
    message_capacity: usize,
}

impl StatusReconciler {
    /// Create an empty reconciler with the default policy.
    pub fn new() -> Self {
        Self {
            state: Snapshot::default(),
            policy: ResetPolicy::default(),
            message_capacity: DEFAULT_MESSAGE_LOG_CAPACITY,
        }
    }

    /// Set the disconnect reset policy.
    pub fn with_policy(mut self, policy: ResetPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set how many free-text messages to keep.
    pub fn with_message_capacity(mut self, capacity: usize) -> Self {
        self.message_capacity = capacity;
        self
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    /// Apply one event and return the resulting snapshot.
    ///
    /// `now` is only used to stamp when an operation starts.
    pub fn apply(&mut self, event: InboundEvent, now: SystemTime) -> Snapshot {
        match event {
            InboundEvent::Connected => {
                self.state.connection = ConnectionState::Connected;
            }
            InboundEvent::Disconnected { .. } => self.apply_disconnect(),
            InboundEvent::Error { message } => {
                self.state.error_message = Some(message);
            }
            InboundEvent::Message { text } => self.push_message(text),
            InboundEvent::Status(status) => self.apply_status(&status, now),
        }
        self.commit()
    }

    /// Record the connection state while a connect is in flight.
    pub fn set_connection(&mut self, connection: ConnectionState) -> Snapshot {
        self.state.connection = connection;
        self.commit()
    }

    /// Clear the error message. Errors never expire on their own.
    pub fn clear_error(&mut self) -> Snapshot {
        self.state.error_message = None;
        self.commit()
    }

    /// The server acknowledged a command. Only records which operation the
    /// user started; status changes wait for the server's own pushes.
    pub fn note_command_accepted(&mut self, kind: &OperationKind) -> Snapshot {
        if *kind != OperationKind::Detect {
            self.state.active_operation_kind = Some(kind.clone());
        }
        self.commit()
    }

    fn commit(&mut self) -> Snapshot {
        self.state.revision = self.state.revision.wrapping_add(1);
        self.state.clone()
    }

    fn apply_disconnect(&mut self) {
        self.state.connection = ConnectionState::Disconnected;
        self.state.is_detecting = false;
        // Nothing can be running on a session that is gone. The last reported
        // status stays for display.
        self.state.is_operation_in_progress = false;
        self.state.operation_started_at = None;
        if self.policy == ResetPolicy::OnDisconnect {
            self.state.records.clear();
            self.state.status = OperationStatus::Idle;
            self.state.status_message = OperationStatus::Idle.display_message().to_string();
            self.state.mount_count = None;
        }
    }

    fn push_message(&mut self, text: String) {
        self.state.last_message = Some(text.clone());
        if self.message_capacity == 0 {
            return;
        }
        self.state.message_log.push(text);
        let len = self.state.message_log.len();
        if len > self.message_capacity {
            self.state.message_log.drain(..len - self.message_capacity);
        }
    }

    fn apply_status(&mut self, event: &StatusEvent, now: SystemTime) {
        if let Some(count) = event.mount_count {
            self.state.mount_count = Some(count);
        }

        match &event.command {
            Some(OperationKind::Detect) => self.apply_detect(event),
            command => {
                if let Some(kind) = command {
                    if kind.is_transfer() {
                        self.upsert(event, kind);
                    }
                    self.state.active_operation_kind = Some(kind.clone());
                }
                self.apply_aggregate(event, now);
            }
        }
    }

    fn apply_detect(&mut self, event: &StatusEvent) {
        match &event.status {
            Some(OperationStatus::Done) => {
                let mut records: Vec<TransferRecord> = Vec::new();
                for entry in event.device_list().unwrap_or_default() {
                    if let Some(record) = TransferRecord::from_detected(entry) {
                        if !records.iter().any(|r| r.id == record.id) {
                            records.push(record);
                        }
                    }
                }
                self.state.records = records;
                self.state.is_detecting = false;
            }
            Some(OperationStatus::Error) => {
                self.state.is_detecting = false;
                self.state.error_message = Some(
                    event
                        .error_text()
                        .unwrap_or("Device detection failed")
                        .to_string(),
                );
            }
            Some(status) => self.state.is_detecting = status.is_active(),
            None => {}
        }
    }

    fn upsert(&mut self, event: &StatusEvent, kind: &OperationKind) {
        match event.shape() {
            StatusShape::Devices(devices) => {
                for fields in devices {
                    // Entries without an identifier cannot be keyed.
                    if let Some(id) = fields.identifier() {
                        self.record_mut(id)
                            .merge(fields, Some(kind), event.status.as_ref());
                    }
                }
            }
            StatusShape::Flat(fields) => {
                // No identifier: aggregate-only signal.
                if let Some(id) = fields.identifier() {
                    self.record_mut(id)
                        .merge(fields, Some(kind), event.status.as_ref());
                }
            }
        }
    }

    fn record_mut(&mut self, id: SourceId) -> &mut TransferRecord {
        let records = &mut self.state.records;
        let index = match records.iter().position(|r| r.id == id) {
            Some(index) => index,
            None => {
                records.push(TransferRecord::new(id));
                records.len() - 1
            }
        };
        &mut records[index]
    }

    fn apply_aggregate(&mut self, event: &StatusEvent, now: SystemTime) {
        let Some(status) = &event.status else {
            return;
        };

        match status {
            OperationStatus::Idle => {
                self.state.is_operation_in_progress = false;
                self.state.operation_started_at = None;
                for record in &mut self.state.records {
                    record.reset_transient();
                }
            }
            OperationStatus::Running | OperationStatus::Verifying => {
                if !self.state.is_operation_in_progress
                    || self.state.operation_started_at.is_none()
                {
                    self.state.operation_started_at = Some(now);
                }
                self.state.is_operation_in_progress = true;
            }
            OperationStatus::Done => {
                self.state.is_operation_in_progress = false;
            }
            OperationStatus::Abort => {
                self.state.is_operation_in_progress = false;
                self.state.active_operation_kind = Some(OperationKind::Abort);
            }
            OperationStatus::Error => {
                self.state.is_operation_in_progress = false;
                self.state.error_message = Some(
                    event
                        .error_text()
                        .unwrap_or("Operation failed")
                        .to_string(),
                );
            }
            OperationStatus::Unknown(_) => {}
        }

        self.state.status = status.clone();
        self.state.status_message = status.display_message().to_string();
    }
}

impl Default for StatusReconciler {
    fn default() -> Self {
        Self::new()
    }
}
