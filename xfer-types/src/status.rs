//! Typed view of a `status` push.
//!
//! The server does not use a fixed schema per message: a detect reply carries
//! a device list, a copy progress tick carries flat fields for one device, a
//! multi-device copy carries a list of per-device payloads. Every field is
//! therefore optional, and keys the client does not know are kept in `extra`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::lenient;
use crate::{OperationKind, OperationStatus, SourceId, WireError};

/// Transfer fields for one source device.
///
/// Appears flat at the top level of a single-device status push, and once per
/// entry in `devices_data` / `mount_dev` lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceFields {
    /// Explicit device identifier (falls back to `src_dir` when absent)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub id: Option<String>,
    /// Per-device status, when the server reports one
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::parsed")]
    pub status: Option<OperationStatus>,
    /// Folder-level progress (older servers)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub progress: Option<f64>,
    /// Folder-level progress
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub folder_progress: Option<f64>,
    /// Progress of the file currently being processed
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub file_progress: Option<f64>,
    /// Path of the file currently being processed
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub file: Option<String>,
    /// Files processed so far
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::count")]
    pub proc_files: Option<u64>,
    /// Total files in the operation
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::count")]
    pub total_files: Option<u64>,
    /// Source directory
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub src_dir: Option<String>,
    /// Destination directory
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub dest_dir: Option<String>,
    /// Drive label
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub drive: Option<String>,
    /// Size of the current file in bytes
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::count")]
    pub file_size: Option<u64>,
    /// Size of the whole source folder in bytes
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::count")]
    pub folder_size: Option<u64>,
    /// Seconds since the operation started on this device
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub elapsed_time: Option<f64>,
    /// Server's own estimate of seconds remaining
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub remaining_time: Option<f64>,
    /// Keys not understood by this client
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl DeviceFields {
    /// Identifier used to key the record: `id`, else `src_dir`. Blank values
    /// do not count.
    pub fn identifier(&self) -> Option<SourceId> {
        self.id
            .as_deref()
            .or(self.src_dir.as_deref())
            .map(SourceId::new)
            .filter(|id| !id.is_empty())
    }

    /// Folder-level progress, preferring `folder_progress` over `progress`.
    pub fn overall_progress(&self) -> Option<f64> {
        self.folder_progress.or(self.progress)
    }

    /// Build from one list entry. Plain strings are mount paths and serve as
    /// both identifier and source directory. Anything else is skipped.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        match entry {
            Value::String(path) if !path.trim().is_empty() => Some(Self {
                id: Some(path.clone()),
                src_dir: Some(path.clone()),
                ..Self::default()
            }),
            Value::Object(_) => serde_json::from_value(entry.clone()).ok(),
            _ => None,
        }
    }
}

/// A decoded `status` push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Operation the push refers to
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::parsed")]
    pub command: Option<OperationKind>,
    /// Aggregate status
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::parsed")]
    pub status: Option<OperationStatus>,
    /// Enumerated mount points (detect replies)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "device_list")]
    pub mount_dev: Option<Vec<DeviceFields>>,
    /// Per-device payloads
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "device_list")]
    pub devices_data: Option<Vec<DeviceFields>>,
    /// Number of mounted devices as counted by the server
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::count")]
    pub mount_count: Option<u64>,
    /// Error description accompanying an `error` status
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub error: Option<String>,
    /// Free-text message accompanying the status
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub message: Option<String>,
    /// Flat single-device fields
    #[serde(flatten)]
    pub fields: DeviceFields,
}

/// How a status push carries its per-device data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusShape<'a> {
    /// A list of per-device payloads.
    Devices(&'a [DeviceFields]),
    /// Flat fields for at most one device.
    Flat(&'a DeviceFields),
}

impl StatusEvent {
    /// Decode from the `data` value of a status frame.
    pub fn from_value(value: Value) -> Result<Self, WireError> {
        if !value.is_object() {
            return Err(WireError::InvalidPayload {
                event: "status".into(),
                reason: format!("expected an object, got {}", json_type(&value)),
            });
        }
        serde_json::from_value(value).map_err(WireError::Deserialization)
    }

    /// The device list, if the push carries one. `devices_data` wins over
    /// `mount_dev` when both are present.
    pub fn device_list(&self) -> Option<&[DeviceFields]> {
        self.devices_data
            .as_deref()
            .or(self.mount_dev.as_deref())
    }

    /// Classify by the presence of list keys.
    pub fn shape(&self) -> StatusShape<'_> {
        match self.device_list() {
            Some(devices) => StatusShape::Devices(devices),
            None => StatusShape::Flat(&self.fields),
        }
    }

    /// Error text for an `error` status, if any was sent.
    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

fn device_list<'de, D>(deserializer: D) -> Result<Option<Vec<DeviceFields>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(entries)) => {
            Some(entries.iter().filter_map(DeviceFields::from_entry).collect())
        }
        _ => None,
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_copy_progress_decodes() {
        let event = StatusEvent::from_value(json!({
            "command": "copy",
            "status": "running",
            "src_dir": "/media/usb0",
            "dest_dir": "/srv/ingest",
            "folder_progress": 42,
            "file_progress": "87.5",
            "file": "/media/usb0/DCIM/0001.JPG",
            "proc_files": 12,
            "total_files": 30,
            "elapsed_time": 60.0,
        }))
        .unwrap();

        assert_eq!(event.command, Some(OperationKind::Copy));
        assert_eq!(event.status, Some(OperationStatus::Running));
        assert_eq!(event.fields.overall_progress(), Some(42.0));
        assert_eq!(event.fields.file_progress, Some(87.5));
        assert_eq!(event.fields.proc_files, Some(12));
        assert_eq!(event.fields.identifier(), Some(SourceId::new("/media/usb0")));
        assert!(matches!(event.shape(), StatusShape::Flat(_)));
    }

    #[test]
    fn detect_reply_with_string_mounts() {
        let event = StatusEvent::from_value(json!({
            "command": "detect",
            "status": "done",
            "mount_dev": ["/media/a", "/media/b", "", 7],
            "mount_count": 2,
        }))
        .unwrap();

        let devices = event.device_list().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].identifier(), Some(SourceId::new("/media/a")));
        assert_eq!(devices[1].src_dir.as_deref(), Some("/media/b"));
        assert_eq!(event.mount_count, Some(2));
    }

    #[test]
    fn devices_data_wins_over_mount_dev() {
        let event = StatusEvent::from_value(json!({
            "command": "copy",
            "status": "running",
            "mount_dev": ["/media/a"],
            "devices_data": [
                {"src_dir": "/media/a", "progress": 10},
                {"src_dir": "/media/b", "progress": 20},
            ],
        }))
        .unwrap();

        match event.shape() {
            StatusShape::Devices(devices) => {
                assert_eq!(devices.len(), 2);
                assert_eq!(devices[1].overall_progress(), Some(20.0));
            }
            other => panic!("expected device list, got {:?}", other),
        }
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let event = StatusEvent::from_value(json!({
            "command": "erase",
            "status": "running",
            "src_dir": "/media/a",
            "firmware": "2.1",
        }))
        .unwrap();

        assert_eq!(event.fields.extra.get("firmware"), Some(&json!("2.1")));
    }

    #[test]
    fn wrongly_typed_fields_read_as_absent() {
        let event = StatusEvent::from_value(json!({
            "command": "copy",
            "status": "running",
            "progress": {"value": 3},
            "total_files": "many",
        }))
        .unwrap();

        assert_eq!(event.fields.overall_progress(), None);
        assert_eq!(event.fields.total_files, None);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = StatusEvent::from_value(json!("running")).unwrap_err();
        assert!(err.to_string().contains("expected an object"));
    }

    #[test]
    fn explicit_id_beats_src_dir() {
        let fields = DeviceFields {
            id: Some("sdb".into()),
            src_dir: Some("/media/sdb1".into()),
            ..DeviceFields::default()
        };
        assert_eq!(fields.identifier(), Some(SourceId::new("sdb")));
    }

    #[test]
    fn error_text_prefers_error_key() {
        let event = StatusEvent::from_value(json!({
            "command": "copy",
            "status": "error",
            "error": "disk full",
            "message": "copy failed",
        }))
        .unwrap();
        assert_eq!(event.error_text(), Some("disk full"));
    }
}
