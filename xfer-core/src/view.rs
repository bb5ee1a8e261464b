//! Selection and display helpers over a [`Snapshot`].
//!
//! Nothing here holds state. The selected index belongs to the caller; these
//! functions only keep it in bounds and turn raw numbers into display text.

use std::time::{Duration, SystemTime};

use crate::reconciler::Snapshot;
use crate::record::TransferRecord;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Read-only projection of a snapshot for picking a device to show.
#[derive(Debug, Clone, Copy)]
pub struct SelectionView<'a> {
    snapshot: &'a Snapshot,
}

impl<'a> SelectionView<'a> {
    /// Wrap a snapshot.
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self { snapshot }
    }

    /// Number of device records.
    pub fn device_count(&self) -> usize {
        self.snapshot.records.len()
    }

    /// Record at `index`, if any.
    pub fn record_at(&self, index: usize) -> Option<&'a TransferRecord> {
        self.snapshot.records.get(index)
    }

    /// Display label: drive label, else source directory, else id.
    pub fn label_for(&self, index: usize) -> Option<&'a str> {
        self.record_at(index).map(label)
    }

    /// Labels for every record in order.
    pub fn labels(&self) -> Vec<&'a str> {
        self.snapshot.records.iter().map(label).collect()
    }

    /// Keep a selection inside `0..count`. Returns 0 for an empty set.
    pub fn clamp_index(desired: usize, count: usize) -> usize {
        desired.min(count.saturating_sub(1))
    }

    /// The record at the clamped selection.
    pub fn active(&self, selected: usize) -> Option<&'a TransferRecord> {
        self.record_at(Self::clamp_index(selected, self.device_count()))
    }

    /// Index of the first record after `from` that has not finished.
    /// Does not wrap around.
    pub fn next_unfinished(&self, from: usize) -> Option<usize> {
        self.snapshot
            .records
            .iter()
            .enumerate()
            .skip(from.saturating_add(1))
            .find(|(_, record)| !record.is_finished())
            .map(|(index, _)| index)
    }
}

fn label(record: &TransferRecord) -> &str {
    if !record.drive_label.trim().is_empty() {
        &record.drive_label
    } else if !record.source_dir.trim().is_empty() {
        &record.source_dir
    } else {
        record.id.as_str()
    }
}

/// Format seconds as `"1h 2m 3s"`. Zero components are left out; zero
/// overall is `"0s"`. Fractions are truncated.
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

/// Format a byte count with binary units: `"512 B"`, `"1.5 KB"`, up to TB.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, SIZE_UNITS[unit])
}

/// Time from `start` to `now`; zero if the clock went backwards.
pub fn elapsed_between(start: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(start).unwrap_or_default()
}
