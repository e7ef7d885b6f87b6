use crate::attendance::face::FeatureVector;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row per (user_id, date). `version` is 0 until the record has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub check_in_location: Option<String>,
    pub check_out_location: Option<String>,
    pub check_in_device: Option<String>,
    pub check_out_device: Option<String>,
    pub check_in_face_score: Option<f64>,
    pub check_out_face_score: Option<f64>,
    pub work_hours: f64,
    pub overtime_hours: f64,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub is_early_leave: bool,
    pub is_corrected: bool,
    pub corrected_by: Option<String>,
    pub corrected_at: Option<DateTime<Utc>>,
    pub original_check_in: Option<DateTime<Utc>>,
    pub original_check_out: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn new(user_id: &str, date: NaiveDate, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            check_in_at: None,
            check_out_at: None,
            check_in_location: None,
            check_out_location: None,
            check_in_device: None,
            check_out_device: None,
            check_in_face_score: None,
            check_out_face_score: None,
            work_hours: 0.0,
            overtime_hours: 0.0,
            status: AttendanceStatus::Absent,
            is_late: false,
            is_early_leave: false,
            is_corrected: false,
            corrected_by: None,
            corrected_at: None,
            original_check_in: None,
            original_check_out: None,
            notes: None,
            version: 0,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn punch_state(&self) -> PunchState {
        match (self.check_in_at, self.check_out_at) {
            (None, _) => PunchState::NoPunch,
            (Some(_), None) => PunchState::CheckedIn,
            (Some(_), Some(_)) => PunchState::CheckedOut,
        }
    }

    /// Checked in but not yet checked out.
    pub fn is_open(&self) -> bool {
        self.punch_state() == PunchState::CheckedIn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchState {
    NoPunch,
    CheckedIn,
    CheckedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    EarlyLeave,
    Absent,
    Leave,
    Holiday,
    Weekend,
    Overtime,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 8] = [
        AttendanceStatus::Present,
        AttendanceStatus::Late,
        AttendanceStatus::EarlyLeave,
        AttendanceStatus::Absent,
        AttendanceStatus::Leave,
        AttendanceStatus::Holiday,
        AttendanceStatus::Weekend,
        AttendanceStatus::Overtime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::EarlyLeave => "early_leave",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Leave => "leave",
            AttendanceStatus::Holiday => "holiday",
            AttendanceStatus::Weekend => "weekend",
            AttendanceStatus::Overtime => "overtime",
        }
    }

    /// Statuses owned by the leave workflow; punches never overwrite them.
    pub fn is_externally_assigned(&self) -> bool {
        matches!(self, AttendanceStatus::Leave | AttendanceStatus::Holiday)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttendanceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Invalid attendance status: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceEnrollment {
    pub user_id: String,
    pub vector: FeatureVector,
    pub model_version: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionLog {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub actor_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_column_value() {
        for status in AttendanceStatus::ALL {
            assert_eq!(status.as_str().parse::<AttendanceStatus>().unwrap(), status);
        }
        assert!("lat".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn punch_state_follows_timestamps() {
        let now = Utc::now();
        let mut record = AttendanceRecord::new("u1", now.date_naive(), now);
        assert_eq!(record.punch_state(), PunchState::NoPunch);
        record.check_in_at = Some(now);
        assert!(record.is_open());
        record.check_out_at = Some(now);
        assert_eq!(record.punch_state(), PunchState::CheckedOut);
    }
}
