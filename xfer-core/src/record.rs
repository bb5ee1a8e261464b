//! Per-device transfer record and the merge rules for partial payloads.

use serde::Serialize;
use xferlink_types::{DeviceFields, OperationKind, OperationStatus, SourceId};

/// Smallest progress value used as a divisor in the remaining-time estimate.
const PROGRESS_EPSILON: f64 = 1e-6;

/// Transfer state of one source device.
///
/// Fields are public for reading; records are only written by the
/// reconciler, and every write goes through [`TransferRecord::merge`] or
/// [`TransferRecord::reset_transient`] so the invariants hold:
/// progress values stay in `[0, 100]`, times stay non-negative,
/// `files_processed <= total_files` whenever `total_files > 0`, and `id`
/// never changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRecord {
    /// Natural key.
    pub id: SourceId,
    /// Last operation reported for this device.
    pub operation_kind: Option<OperationKind>,
    /// Last status reported for this device.
    pub status: OperationStatus,
    /// Folder-level progress in percent.
    pub overall_progress: f64,
    /// Current-file progress in percent.
    pub file_progress: f64,
    /// File currently being processed.
    pub current_file: String,
    /// Files processed so far.
    pub files_processed: u64,
    /// Files in the operation.
    pub total_files: u64,
    /// Seconds elapsed.
    pub elapsed_time: f64,
    /// Estimated seconds remaining.
    pub remaining_time: f64,
    /// Source directory.
    pub source_dir: String,
    /// Destination directory.
    pub dest_dir: String,
    /// Drive label.
    pub drive_label: String,
    /// Size of the current file.
    pub file_size_bytes: u64,
    /// Size of the source folder.
    pub folder_size_bytes: u64,
    /// Display text for `status`.
    pub status_message: String,
}

impl TransferRecord {
    /// A zeroed, idle record.
    pub fn new(id: SourceId) -> Self {
        Self {
            source_dir: id.as_str().to_string(),
            id,
            operation_kind: None,
            status: OperationStatus::Idle,
            overall_progress: 0.0,
            file_progress: 0.0,
            current_file: String::new(),
            files_processed: 0,
            total_files: 0,
            elapsed_time: 0.0,
            remaining_time: 0.0,
            dest_dir: String::new(),
            drive_label: String::new(),
            file_size_bytes: 0,
            folder_size_bytes: 0,
            status_message: OperationStatus::Idle.display_message().to_string(),
        }
    }

    /// A record for a freshly detected device: descriptive fields from the
    /// entry, transfer fields zeroed, status idle. `None` when the entry has
    /// no identifier.
    pub fn from_detected(fields: &DeviceFields) -> Option<Self> {
        let mut record = Self::new(fields.identifier()?);
        if let Some(src) = &fields.src_dir {
            record.source_dir = src.clone();
        }
        if let Some(dest) = &fields.dest_dir {
            record.dest_dir = dest.clone();
        }
        if let Some(drive) = &fields.drive {
            record.drive_label = drive.clone();
        }
        if let Some(size) = fields.folder_size {
            record.folder_size_bytes = size;
        }
        Some(record)
    }

    /// Merge a partial payload. Absent fields keep their current value.
    ///
    /// The record's status comes from the payload's own `status` if present,
    /// else from `fallback_status` (the push's top-level status).
    pub fn merge(
        &mut self,
        fields: &DeviceFields,
        kind: Option<&OperationKind>,
        fallback_status: Option<&OperationStatus>,
    ) {
        if let Some(kind) = kind {
            self.operation_kind = Some(kind.clone());
        }
        if let Some(status) = fields.status.as_ref().or(fallback_status) {
            self.status = status.clone();
            self.status_message = status.display_message().to_string();
        }

        let progress = fields.overall_progress();
        if let Some(progress) = progress {
            self.overall_progress = clamp_percent(progress);
        }
        if let Some(file_progress) = fields.file_progress {
            self.file_progress = clamp_percent(file_progress);
        }
        if let Some(file) = &fields.file {
            self.current_file = file.clone();
        }
        if let Some(total) = fields.total_files {
            self.total_files = total;
        }
        if let Some(processed) = fields.proc_files {
            self.files_processed = processed;
        }
        if self.total_files > 0 && self.files_processed > self.total_files {
            self.files_processed = self.total_files;
        }
        if let Some(src) = &fields.src_dir {
            self.source_dir = src.clone();
        }
        if let Some(dest) = &fields.dest_dir {
            self.dest_dir = dest.clone();
        }
        if let Some(drive) = &fields.drive {
            self.drive_label = drive.clone();
        }
        if let Some(size) = fields.file_size {
            self.file_size_bytes = size;
        }
        if let Some(size) = fields.folder_size {
            self.folder_size_bytes = size;
        }

        let elapsed = fields.elapsed_time.map(non_negative);
        if let Some(elapsed) = elapsed {
            self.elapsed_time = elapsed;
        }

        if progress.is_some() || elapsed.is_some() {
            self.remaining_time = estimate_remaining(self.elapsed_time, self.overall_progress);
        } else if let Some(remaining) = fields.remaining_time {
            self.remaining_time = non_negative(remaining);
        }
    }

    /// Zero the per-transfer fields and go back to idle. Descriptive fields
    /// (directories, drive label, sizes) are kept.
    pub fn reset_transient(&mut self) {
        self.status = OperationStatus::Idle;
        self.status_message = OperationStatus::Idle.display_message().to_string();
        self.overall_progress = 0.0;
        self.file_progress = 0.0;
        self.current_file.clear();
        self.files_processed = 0;
        self.elapsed_time = 0.0;
        self.remaining_time = 0.0;
    }

    /// Whether the folder-level progress has reached 100.
    pub fn is_finished(&self) -> bool {
        self.overall_progress >= 100.0
    }
}

/// Clamp a percentage to `[0, 100]`. NaN becomes 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Linear-rate extrapolation of the time left.
///
/// `elapsed / progress * 100 - elapsed`, with `0` when nothing has progressed
/// yet. Never negative. Noisy early in a transfer; converges as elapsed time
/// grows.
pub fn estimate_remaining(elapsed_secs: f64, progress_percent: f64) -> f64 {
    let progress = clamp_percent(progress_percent);
    if progress <= 0.0 {
        return 0.0;
    }
    let elapsed = non_negative(elapsed_secs);
    non_negative(elapsed / progress.max(PROGRESS_EPSILON) * 100.0 - elapsed)
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> DeviceFields {
        DeviceFields::default()
    }

    #[test]
    fn remaining_is_zero_without_progress() {
        assert_eq!(estimate_remaining(120.0, 0.0), 0.0);
        assert_eq!(estimate_remaining(0.0, 0.0), 0.0);
    }

    #[test]
    fn remaining_extrapolates_linearly() {
        // 25% done in 60s -> 180s left
        assert!((estimate_remaining(60.0, 25.0) - 180.0).abs() < 1e-9);
        assert_eq!(estimate_remaining(60.0, 100.0), 0.0);
    }

    #[test]
    fn remaining_is_never_negative() {
        assert_eq!(estimate_remaining(-5.0, 50.0), 0.0);
        assert_eq!(estimate_remaining(10.0, 250.0), 0.0);
        assert_eq!(estimate_remaining(f64::NAN, 10.0), 0.0);
    }

    #[test]
    fn progress_is_clamped_on_merge() {
        let mut record = TransferRecord::new(SourceId::new("a"));
        record.merge(
            &DeviceFields {
                progress: Some(140.0),
                file_progress: Some(-3.0),
                ..fields()
            },
            None,
            None,
        );
        assert_eq!(record.overall_progress, 100.0);
        assert_eq!(record.file_progress, 0.0);
    }

    #[test]
    fn processed_files_never_exceed_total() {
        let mut record = TransferRecord::new(SourceId::new("a"));
        record.merge(
            &DeviceFields {
                proc_files: Some(12),
                total_files: Some(10),
                ..fields()
            },
            None,
            None,
        );
        assert_eq!(record.files_processed, 10);

        // Without a known total the count is taken as-is
        let mut open = TransferRecord::new(SourceId::new("b"));
        open.merge(
            &DeviceFields {
                proc_files: Some(12),
                ..fields()
            },
            None,
            None,
        );
        assert_eq!(open.files_processed, 12);
    }

    #[test]
    fn absent_fields_keep_previous_values() {
        let mut record = TransferRecord::new(SourceId::new("a"));
        record.merge(
            &DeviceFields {
                progress: Some(30.0),
                file: Some("x.bin".into()),
                dest_dir: Some("/dst".into()),
                ..fields()
            },
            Some(&OperationKind::Copy),
            Some(&OperationStatus::Running),
        );
        record.merge(
            &DeviceFields {
                file_progress: Some(50.0),
                ..fields()
            },
            None,
            None,
        );

        assert_eq!(record.overall_progress, 30.0);
        assert_eq!(record.current_file, "x.bin");
        assert_eq!(record.dest_dir, "/dst");
        assert_eq!(record.file_progress, 50.0);
        assert_eq!(record.status, OperationStatus::Running);
        assert_eq!(record.operation_kind, Some(OperationKind::Copy));
    }

    #[test]
    fn payload_status_beats_fallback() {
        let mut record = TransferRecord::new(SourceId::new("a"));
        record.merge(
            &DeviceFields {
                status: Some(OperationStatus::Verifying),
                ..fields()
            },
            None,
            Some(&OperationStatus::Running),
        );
        assert_eq!(record.status, OperationStatus::Verifying);
        assert_eq!(record.status_message, "Verifying");
    }

    #[test]
    fn remaining_recomputed_on_progress_update() {
        let mut record = TransferRecord::new(SourceId::new("a"));
        record.merge(
            &DeviceFields {
                elapsed_time: Some(30.0),
                progress: Some(50.0),
                remaining_time: Some(999.0),
                ..fields()
            },
            None,
            None,
        );
        assert!((record.remaining_time - 30.0).abs() < 1e-9);
    }

    #[test]
    fn server_estimate_used_when_no_progress_update() {
        let mut record = TransferRecord::new(SourceId::new("a"));
        record.merge(
            &DeviceFields {
                remaining_time: Some(-12.0),
                ..fields()
            },
            None,
            None,
        );
        assert_eq!(record.remaining_time, 0.0);
    }

    #[test]
    fn reset_keeps_descriptive_fields() {
        let mut record = TransferRecord::new(SourceId::new("a"));
        record.merge(
            &DeviceFields {
                progress: Some(80.0),
                elapsed_time: Some(10.0),
                proc_files: Some(3),
                drive: Some("SD_CARD".into()),
                ..fields()
            },
            None,
            Some(&OperationStatus::Running),
        );
        record.reset_transient();

        assert_eq!(record.overall_progress, 0.0);
        assert_eq!(record.elapsed_time, 0.0);
        assert_eq!(record.remaining_time, 0.0);
        assert_eq!(record.files_processed, 0);
        assert_eq!(record.status, OperationStatus::Idle);
        assert_eq!(record.drive_label, "SD_CARD");
    }

    #[test]
    fn detected_entry_without_identifier_is_skipped() {
        assert!(TransferRecord::from_detected(&fields()).is_none());

        let record = TransferRecord::from_detected(&DeviceFields {
            src_dir: Some("/media/a".into()),
            drive: Some("CAM_A".into()),
            progress: Some(70.0),
            ..fields()
        })
        .unwrap();
        assert_eq!(record.id, SourceId::new("/media/a"));
        assert_eq!(record.drive_label, "CAM_A");
        assert_eq!(record.overall_progress, 0.0);
    }
}
