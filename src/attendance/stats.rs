use crate::database::models::{AttendanceRecord, AttendanceStatus};
use crate::utils::time::round_hundredths;
use std::collections::BTreeMap;

/// Aggregate over a set of attendance records, typically one user's week or month.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttendanceSummary {
    pub total_days: usize,
    pub status_counts: BTreeMap<AttendanceStatus, usize>,
    pub late_count: usize,
    pub early_leave_count: usize,
    pub total_work_hours: f64,
    /// Mean over days with recorded work only.
    pub average_work_hours: f64,
    pub total_overtime_hours: f64,
}

impl AttendanceSummary {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut summary = Self {
            total_days: records.len(),
            ..Self::default()
        };

        let mut worked_days = 0usize;
        for record in records {
            *summary.status_counts.entry(record.status).or_insert(0) += 1;
            if record.is_late {
                summary.late_count += 1;
            }
            if record.is_early_leave {
                summary.early_leave_count += 1;
            }
            if record.work_hours > 0.0 {
                worked_days += 1;
                summary.total_work_hours += record.work_hours;
            }
            summary.total_overtime_hours += record.overtime_hours;
        }

        if worked_days > 0 {
            summary.average_work_hours =
                round_hundredths(summary.total_work_hours / worked_days as f64);
        }
        summary.total_work_hours = round_hundredths(summary.total_work_hours);
        summary.total_overtime_hours = round_hundredths(summary.total_overtime_hours);

        summary
    }

    pub fn count(&self, status: AttendanceStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }
}
