use crate::attendance::error::PunchError;
use crate::attendance::policy::ClockPolicy;
use crate::database::models::{AttendanceRecord, AttendanceStatus};
use crate::utils::time::{hours_between, local_date, local_datetime, local_time, round_hundredths};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

/// Device recorded on a punch whose time was entered by an administrator.
pub const CORRECTION_DEVICE: &str = "admin-correction";

/// A single record never spans this many hours or more.
const MAX_SHIFT_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct Punch {
    pub at: DateTime<Utc>,
    pub location: Option<String>,
    pub device: Option<String>,
    pub face_score: Option<f64>,
}

impl Punch {
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            location: None,
            device: None,
            face_score: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PunchCorrection {
    Keep,
    Set(DateTime<Utc>),
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub actor_id: String,
    pub check_in: PunchCorrection,
    pub check_out: PunchCorrection,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Status changes driven by the leave workflow rather than by punches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOverride {
    Leave,
    Holiday,
    Clear,
}

/// Punch state machine for a single (user, date) record.
///
/// Every operation takes the current record by reference and returns a new one,
/// so a failed transition never leaves a half-updated record behind.
#[derive(Debug, Clone)]
pub struct AttendanceClock {
    policy: ClockPolicy,
}

impl AttendanceClock {
    pub fn new(policy: ClockPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ClockPolicy {
        &self.policy
    }

    /// Date key a punch at `at` belongs to, in the reporting timezone.
    pub fn record_date(&self, at: DateTime<Utc>) -> NaiveDate {
        local_date(at, self.policy.utc_offset)
    }

    pub fn check_in(
        &self,
        record: &AttendanceRecord,
        punch: &Punch,
    ) -> Result<AttendanceRecord, PunchError> {
        if record.check_in_at.is_some() {
            return Err(PunchError::AlreadyCheckedIn);
        }

        let mut updated = record.clone();
        updated.check_in_at = Some(punch.at);
        if punch.location.is_some() {
            updated.check_in_location = punch.location.clone();
        }
        if punch.device.is_some() {
            updated.check_in_device = punch.device.clone();
        }
        if punch.face_score.is_some() {
            updated.check_in_face_score = punch.face_score;
        }
        updated.updated_at = punch.at;

        self.recompute(&mut updated);
        Ok(updated)
    }

    pub fn check_out(
        &self,
        record: &AttendanceRecord,
        punch: &Punch,
    ) -> Result<AttendanceRecord, PunchError> {
        let Some(check_in) = record.check_in_at else {
            return Err(PunchError::NotCheckedInYet);
        };
        if record.check_out_at.is_some() {
            return Err(PunchError::AlreadyCheckedOut);
        }
        if punch.at - check_in >= TimeDelta::hours(MAX_SHIFT_HOURS) {
            return Err(PunchError::ShiftTooLong);
        }

        let mut updated = record.clone();
        updated.check_out_at = Some(punch.at);
        if punch.location.is_some() {
            updated.check_out_location = punch.location.clone();
        }
        if punch.device.is_some() {
            updated.check_out_device = punch.device.clone();
        }
        if punch.face_score.is_some() {
            updated.check_out_face_score = punch.face_score;
        }
        updated.updated_at = punch.at;

        self.recompute(&mut updated);
        Ok(updated)
    }

    /// Administrative override of either punch. The first correction archives the
    /// original punches; later corrections leave that archive untouched.
    pub fn correct(
        &self,
        record: &AttendanceRecord,
        correction: &Correction,
    ) -> Result<AttendanceRecord, PunchError> {
        if correction.actor_id.trim().is_empty() {
            return Err(PunchError::InvalidCorrection(
                "an acting administrator is required".to_string(),
            ));
        }
        if correction.reason.trim().is_empty() {
            return Err(PunchError::InvalidCorrection(
                "a reason is required".to_string(),
            ));
        }

        let mut updated = record.clone();
        if !updated.is_corrected {
            updated.is_corrected = true;
            updated.original_check_in = record.check_in_at;
            updated.original_check_out = record.check_out_at;
        }

        match correction.check_in {
            PunchCorrection::Keep => {}
            PunchCorrection::Set(at) => {
                updated.check_in_at = Some(at);
                updated.check_in_location = None;
                updated.check_in_device = Some(CORRECTION_DEVICE.to_string());
                updated.check_in_face_score = None;
            }
            PunchCorrection::Clear => {
                updated.check_in_at = None;
                updated.check_in_location = None;
                updated.check_in_device = None;
                updated.check_in_face_score = None;
            }
        }

        match correction.check_out {
            PunchCorrection::Keep => {}
            PunchCorrection::Set(at) => {
                updated.check_out_at = Some(at);
                updated.check_out_location = None;
                updated.check_out_device = Some(CORRECTION_DEVICE.to_string());
                updated.check_out_face_score = None;
            }
            PunchCorrection::Clear => {
                updated.check_out_at = None;
                updated.check_out_location = None;
                updated.check_out_device = None;
                updated.check_out_face_score = None;
            }
        }

        if updated.check_in_at.is_none() && updated.check_out_at.is_some() {
            return Err(PunchError::InvalidCorrection(
                "a check-out requires a check-in".to_string(),
            ));
        }

        updated.corrected_by = Some(correction.actor_id.clone());
        updated.corrected_at = Some(correction.at);
        updated.notes = Some(correction.reason.clone());
        updated.updated_at = correction.at;

        self.recompute(&mut updated);
        Ok(updated)
    }

    pub fn override_status(
        &self,
        record: &AttendanceRecord,
        status_override: StatusOverride,
        at: DateTime<Utc>,
    ) -> AttendanceRecord {
        let mut updated = record.clone();
        updated.status = match status_override {
            StatusOverride::Leave => AttendanceStatus::Leave,
            StatusOverride::Holiday => AttendanceStatus::Holiday,
            // Any clock-derived value works here; recompute replaces it.
            StatusOverride::Clear => AttendanceStatus::Absent,
        };
        updated.updated_at = at;

        self.recompute(&mut updated);
        updated
    }

    /// Whether a check-out at `check_out` closes a shift that began on the previous
    /// day at `check_in`. Only a wall-clock time earlier than the check-in counts.
    pub fn closes_overnight(&self, check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> bool {
        let offset = self.policy.utc_offset;
        check_out > check_in
            && check_out - check_in < TimeDelta::hours(MAX_SHIFT_HOURS)
            && local_time(check_out, offset) < local_time(check_in, offset)
    }

    /// Local wall-clock end of the shift. A check-out that is earlier than the
    /// check-in is taken to be on the following calendar day.
    fn effective_check_out(
        &self,
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
    ) -> NaiveDateTime {
        let offset = self.policy.utc_offset;
        if check_out >= check_in {
            return local_datetime(check_out, offset);
        }

        let start = local_datetime(check_in, offset);
        let mut end = start.date().and_time(local_time(check_out, offset));
        if end < start {
            end += TimeDelta::days(1);
        }
        end
    }

    fn recompute(&self, record: &mut AttendanceRecord) {
        let offset = self.policy.utc_offset;

        let shift = match (record.check_in_at, record.check_out_at) {
            (Some(check_in), Some(check_out)) => Some((
                local_datetime(check_in, offset),
                self.effective_check_out(check_in, check_out),
            )),
            _ => None,
        };

        record.work_hours = shift.map_or(0.0, |(start, end)| hours_between(start, end));
        record.overtime_hours =
            round_hundredths((record.work_hours - self.policy.standard_day_hours).max(0.0));
        record.is_late = false;
        record.is_early_leave = false;

        if record.status.is_externally_assigned() {
            return;
        }

        if !self.policy.is_work_day(record.date) {
            record.status = AttendanceStatus::Weekend;
            return;
        }

        let Some(check_in) = record.check_in_at else {
            record.status = AttendanceStatus::Absent;
            return;
        };

        record.is_late = local_time(check_in, offset) > self.policy.late_cutoff();

        if let Some((start, end)) = shift {
            record.is_early_leave =
                end.date() == start.date() && end.time() < self.policy.early_leave_cutoff();
        }

        let overtime_minutes = record.overtime_hours * 60.0;
        let is_overtime = record.overtime_hours > 0.0
            && overtime_minutes >= self.policy.overtime_threshold_minutes as f64;

        record.status = if record.is_late {
            AttendanceStatus::Late
        } else if is_overtime {
            AttendanceStatus::Overtime
        } else {
            AttendanceStatus::Present
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::combine_date_time;
    use chrono::NaiveTime;

    // 2025-03-03 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn clock() -> AttendanceClock {
        AttendanceClock::new(ClockPolicy::default())
    }

    fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        combine_date_time(
            date,
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            ClockPolicy::default().utc_offset,
        )
    }

    fn fresh(date: NaiveDate) -> AttendanceRecord {
        AttendanceRecord::new("alice", date, at(date, 0, 0))
    }

    fn checked_in(hour: u32, minute: u32) -> AttendanceRecord {
        clock()
            .check_in(&fresh(monday()), &Punch::at(at(monday(), hour, minute)))
            .unwrap()
    }

    #[test]
    fn check_in_within_grace_period_is_present() {
        let record = checked_in(9, 5);
        assert_eq!(record.status, AttendanceStatus::Present);
        assert!(!record.is_late);

        let record = checked_in(9, 10);
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[test]
    fn check_in_after_grace_period_is_late() {
        let record = checked_in(9, 11);
        assert_eq!(record.status, AttendanceStatus::Late);
        assert!(record.is_late);
    }

    #[test]
    fn check_in_records_punch_details() {
        let punch = Punch {
            at: at(monday(), 8, 55),
            location: Some("HQ lobby".to_string()),
            device: Some("kiosk-1".to_string()),
            face_score: Some(87.5),
        };
        let record = clock().check_in(&fresh(monday()), &punch).unwrap();
        assert_eq!(record.check_in_at, Some(punch.at));
        assert_eq!(record.check_in_location.as_deref(), Some("HQ lobby"));
        assert_eq!(record.check_in_device.as_deref(), Some("kiosk-1"));
        assert_eq!(record.check_in_face_score, Some(87.5));
        assert_eq!(record.check_out_at, None);
    }

    #[test]
    fn second_check_in_is_rejected() {
        let record = checked_in(9, 0);
        let err = clock()
            .check_in(&record, &Punch::at(at(monday(), 9, 30)))
            .unwrap_err();
        assert_eq!(err, PunchError::AlreadyCheckedIn);
    }

    #[test]
    fn check_out_without_check_in_is_rejected() {
        let err = clock()
            .check_out(&fresh(monday()), &Punch::at(at(monday(), 18, 0)))
            .unwrap_err();
        assert_eq!(err, PunchError::NotCheckedInYet);
    }

    #[test]
    fn overtime_day() {
        let record = checked_in(9, 0);
        let record = clock()
            .check_out(&record, &Punch::at(at(monday(), 19, 30)))
            .unwrap();
        assert_eq!(record.work_hours, 10.5);
        assert_eq!(record.overtime_hours, 2.5);
        assert_eq!(record.status, AttendanceStatus::Overtime);
        assert!(!record.is_early_leave);
    }

    #[test]
    fn late_beats_overtime() {
        let record = checked_in(9, 30);
        let record = clock()
            .check_out(&record, &Punch::at(at(monday(), 20, 0)))
            .unwrap();
        assert_eq!(record.overtime_hours, 2.5);
        assert_eq!(record.status, AttendanceStatus::Late);
    }

    #[test]
    fn overtime_threshold_gates_the_status_only() {
        let mut policy = ClockPolicy::default();
        policy.overtime_threshold_minutes = 60;
        let clock = AttendanceClock::new(policy);

        let record = clock
            .check_in(&fresh(monday()), &Punch::at(at(monday(), 9, 0)))
            .unwrap();
        let record = clock
            .check_out(&record, &Punch::at(at(monday(), 17, 30)))
            .unwrap();
        assert_eq!(record.overtime_hours, 0.5);
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[test]
    fn early_leave_is_a_flag_not_a_status() {
        let record = checked_in(9, 0);
        let record = clock()
            .check_out(&record, &Punch::at(at(monday(), 17, 0)))
            .unwrap();
        assert!(record.is_early_leave);
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.work_hours, 8.0);
        assert_eq!(record.overtime_hours, 0.0);
    }

    #[test]
    fn cross_midnight_with_next_day_timestamp() {
        let record = checked_in(23, 30);
        let next_day = monday().succ_opt().unwrap();
        let record = clock()
            .check_out(&record, &Punch::at(at(next_day, 0, 15)))
            .unwrap();
        assert_eq!(record.work_hours, 0.75);
        assert_eq!(record.date, monday());
        assert!(!record.is_early_leave);
    }

    #[test]
    fn cross_midnight_with_same_day_wall_clock() {
        let record = checked_in(23, 30);
        let record = clock()
            .check_out(&record, &Punch::at(at(monday(), 0, 15)))
            .unwrap();
        assert_eq!(record.work_hours, 0.75);
        assert!(record.work_hours >= 0.0);
    }

    #[test]
    fn check_out_a_day_later_is_rejected() {
        let record = checked_in(9, 0);
        let next_day = monday().succ_opt().unwrap();

        let err = clock()
            .check_out(&record, &Punch::at(at(next_day, 9, 0)))
            .unwrap_err();
        assert_eq!(err, PunchError::ShiftTooLong);

        let err = clock()
            .check_out(&record, &Punch::at(at(next_day, 18, 0)))
            .unwrap_err();
        assert_eq!(err, PunchError::ShiftTooLong);
    }

    #[test]
    fn overnight_close_needs_an_earlier_wall_clock() {
        let next_day = monday().succ_opt().unwrap();
        assert!(clock().closes_overnight(at(monday(), 23, 30), at(next_day, 0, 15)));
        assert!(clock().closes_overnight(at(monday(), 9, 0), at(next_day, 8, 59)));
        assert!(!clock().closes_overnight(at(monday(), 9, 0), at(next_day, 18, 0)));
        assert!(!clock().closes_overnight(at(monday(), 9, 0), at(monday(), 18, 0)));
    }

    #[test]
    fn duplicate_check_out_keeps_the_first() {
        let record = checked_in(9, 0);
        let first = clock()
            .check_out(&record, &Punch::at(at(monday(), 18, 0)))
            .unwrap();
        let err = clock()
            .check_out(&first, &Punch::at(at(monday(), 19, 0)))
            .unwrap_err();
        assert_eq!(err, PunchError::AlreadyCheckedOut);
        assert_eq!(first.check_out_at, Some(at(monday(), 18, 0)));
    }

    #[test]
    fn weekend_punches_are_classified_weekend() {
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let record = clock()
            .check_in(&fresh(saturday), &Punch::at(at(saturday, 11, 0)))
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Weekend);
        assert!(!record.is_late);

        let record = clock()
            .check_out(&record, &Punch::at(at(saturday, 22, 0)))
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Weekend);
        assert_eq!(record.overtime_hours, 3.0);
    }

    #[test]
    fn leave_takes_precedence_over_punches() {
        let record = clock().override_status(
            &fresh(monday()),
            StatusOverride::Leave,
            at(monday(), 8, 0),
        );
        assert_eq!(record.status, AttendanceStatus::Leave);

        let record = clock()
            .check_in(&record, &Punch::at(at(monday(), 10, 0)))
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Leave);
        assert!(!record.is_late);

        let cleared = clock().override_status(&record, StatusOverride::Clear, at(monday(), 12, 0));
        assert_eq!(cleared.status, AttendanceStatus::Late);
    }

    fn correction(check_in: PunchCorrection, check_out: PunchCorrection) -> Correction {
        Correction {
            actor_id: "admin".to_string(),
            check_in,
            check_out,
            reason: "forgot to punch".to_string(),
            at: at(monday(), 20, 0),
        }
    }

    #[test]
    fn correction_preserves_the_first_original() {
        let record = checked_in(9, 5);

        let first = clock()
            .correct(
                &record,
                &correction(PunchCorrection::Set(at(monday(), 9, 0)), PunchCorrection::Keep),
            )
            .unwrap();
        assert!(first.is_corrected);
        assert_eq!(first.check_in_at, Some(at(monday(), 9, 0)));
        assert_eq!(first.original_check_in, Some(at(monday(), 9, 5)));
        assert_eq!(first.corrected_by.as_deref(), Some("admin"));

        let second = clock()
            .correct(
                &first,
                &correction(PunchCorrection::Set(at(monday(), 8, 55)), PunchCorrection::Keep),
            )
            .unwrap();
        assert_eq!(second.check_in_at, Some(at(monday(), 8, 55)));
        assert_eq!(second.original_check_in, Some(at(monday(), 9, 5)));
    }

    #[test]
    fn corrected_punch_drops_the_original_place_and_device() {
        let punch = Punch {
            at: at(monday(), 9, 20),
            location: Some("HQ lobby".to_string()),
            device: Some("kiosk-1".to_string()),
            face_score: Some(92.0),
        };
        let record = clock().check_in(&fresh(monday()), &punch).unwrap();
        let record = clock()
            .check_out(
                &record,
                &Punch {
                    at: at(monday(), 18, 0),
                    ..punch.clone()
                },
            )
            .unwrap();

        let corrected = clock()
            .correct(
                &record,
                &correction(PunchCorrection::Set(at(monday(), 9, 0)), PunchCorrection::Keep),
            )
            .unwrap();
        assert_eq!(corrected.check_in_location, None);
        assert_eq!(corrected.check_in_device.as_deref(), Some(CORRECTION_DEVICE));
        assert_eq!(corrected.check_in_face_score, None);
        assert_eq!(corrected.check_out_location.as_deref(), Some("HQ lobby"));
        assert_eq!(corrected.check_out_device.as_deref(), Some("kiosk-1"));
    }

    #[test]
    fn correction_recomputes_hours_and_status() {
        let record = checked_in(9, 30);
        let record = clock()
            .check_out(&record, &Punch::at(at(monday(), 18, 0)))
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Late);

        let corrected = clock()
            .correct(
                &record,
                &correction(
                    PunchCorrection::Set(at(monday(), 8, 30)),
                    PunchCorrection::Set(at(monday(), 19, 0)),
                ),
            )
            .unwrap();
        assert_eq!(corrected.work_hours, 10.5);
        assert_eq!(corrected.overtime_hours, 2.5);
        assert_eq!(corrected.status, AttendanceStatus::Overtime);
        assert_eq!(corrected.original_check_out, Some(at(monday(), 18, 0)));
    }

    #[test]
    fn correction_can_return_to_no_punch() {
        let record = checked_in(9, 0);
        let record = clock()
            .check_out(&record, &Punch::at(at(monday(), 18, 0)))
            .unwrap();

        let reopened = clock()
            .correct(&record, &correction(PunchCorrection::Keep, PunchCorrection::Clear))
            .unwrap();
        assert!(reopened.is_open());
        assert_eq!(reopened.work_hours, 0.0);

        let cleared = clock()
            .correct(&reopened, &correction(PunchCorrection::Clear, PunchCorrection::Keep))
            .unwrap();
        assert_eq!(cleared.check_in_at, None);
        assert_eq!(cleared.status, AttendanceStatus::Absent);
        assert_eq!(cleared.original_check_out, Some(at(monday(), 18, 0)));
    }

    #[test]
    fn correction_rejects_orphan_check_out_and_missing_reason() {
        let err = clock()
            .correct(
                &fresh(monday()),
                &correction(PunchCorrection::Keep, PunchCorrection::Set(at(monday(), 18, 0))),
            )
            .unwrap_err();
        assert!(matches!(err, PunchError::InvalidCorrection(_)));

        let mut no_reason = correction(PunchCorrection::Keep, PunchCorrection::Keep);
        no_reason.reason = "  ".to_string();
        assert!(matches!(
            clock().correct(&fresh(monday()), &no_reason),
            Err(PunchError::InvalidCorrection(_))
        ));
    }
}
