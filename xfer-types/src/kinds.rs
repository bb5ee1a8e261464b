//! Open enums for the `command` and `status` fields of a status push.
//!
//! Both are open-ended on the wire: values the client does not recognize are
//! kept verbatim in an `Unknown` variant instead of failing the frame.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of remote operation a status push (or a command) refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    /// Copy the source folders to their destinations.
    Copy,
    /// Erase the source media (`delete` on older servers).
    Erase,
    /// Enumerate currently reachable source devices.
    Detect,
    /// Abort whatever is running.
    Abort,
    /// Any other command name, stored verbatim.
    Unknown(String),
}

impl OperationKind {
    /// Parse a wire value. Matching is case-insensitive and ignores surrounding
    /// whitespace.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "copy" => Self::Copy,
            "erase" | "delete" => Self::Erase,
            "detect" => Self::Detect,
            "abort" | "cancel" => Self::Abort,
            _ => Self::Unknown(value.to_string()),
        }
    }

    /// Canonical wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Copy => "copy",
            Self::Erase => "erase",
            Self::Detect => "detect",
            Self::Abort => "abort",
            Self::Unknown(raw) => raw,
        }
    }

    /// Copy and erase are the two kinds that mutate per-device transfer records.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Copy | Self::Erase)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OperationKind {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<OperationKind> for String {
    fn from(value: OperationKind) -> Self {
        value.as_str().to_string()
    }
}

/// Status of an operation, either aggregate or per device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationStatus {
    /// Nothing running; the server has reset.
    #[default]
    Idle,
    /// Transfer in progress.
    Running,
    /// Copy finished, destination being verified.
    Verifying,
    /// Operation completed.
    Done,
    /// Operation was aborted.
    Abort,
    /// Operation failed.
    Error,
    /// Any other status value, stored verbatim.
    Unknown(String),
}

impl OperationStatus {
    /// Parse a wire value. Matching is case-insensitive.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "idle" => Self::Idle,
            "running" => Self::Running,
            "verifying" => Self::Verifying,
            "done" => Self::Done,
            "abort" | "aborted" => Self::Abort,
            "error" => Self::Error,
            _ => Self::Unknown(value.to_string()),
        }
    }

    /// Canonical wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Verifying => "verifying",
            Self::Done => "done",
            Self::Abort => "abort",
            Self::Error => "error",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether work is still happening on the remote side.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Verifying)
    }

    /// Human-readable message shown next to this status.
    pub fn display_message(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Processing...",
            Self::Verifying => "Verifying",
            Self::Done => "Done",
            Self::Abort => "Aborted",
            Self::Error => "Error",
            Self::Unknown(_) => "Unknown Status",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OperationStatus {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<OperationStatus> for String {
    fn from(value: OperationStatus) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_is_an_alias_for_erase() {
        assert_eq!(OperationKind::from_wire("delete"), OperationKind::Erase);
        assert_eq!(OperationKind::from_wire("ERASE"), OperationKind::Erase);
        assert_eq!(OperationKind::Erase.as_str(), "erase");
    }

    #[test]
    fn unknown_kind_is_kept_verbatim() {
        let kind = OperationKind::from_wire("format");
        assert_eq!(kind, OperationKind::Unknown("format".into()));
        assert_eq!(kind.to_string(), "format");
        assert!(!kind.is_transfer());
    }

    #[test]
    fn only_copy_and_erase_are_transfers() {
        assert!(OperationKind::Copy.is_transfer());
        assert!(OperationKind::Erase.is_transfer());
        assert!(!OperationKind::Detect.is_transfer());
        assert!(!OperationKind::Abort.is_transfer());
    }

    #[test]
    fn status_deserializes_from_plain_string() {
        let status: OperationStatus = serde_json::from_str("\"Verifying\"").unwrap();
        assert_eq!(status, OperationStatus::Verifying);

        let odd: OperationStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(odd, OperationStatus::Unknown("paused".into()));
        assert_eq!(odd.display_message(), "Unknown Status");
    }

    #[test]
    fn active_statuses() {
        assert!(OperationStatus::Running.is_active());
        assert!(OperationStatus::Verifying.is_active());
        assert!(!OperationStatus::Done.is_active());
        assert!(!OperationStatus::Idle.is_active());
        assert!(!OperationStatus::Unknown("x".into()).is_active());
    }
}
