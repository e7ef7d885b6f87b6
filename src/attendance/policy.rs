use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Weekday};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("work end time {end} must be after work start time {start}")]
    WorkDayInverted { start: NaiveTime, end: NaiveTime },
    #[error("{name} must not be negative (got {value})")]
    NegativeThreshold { name: &'static str, value: i64 },
    #[error("standard day hours must be positive (got {0})")]
    NonPositiveStandardDay(f64),
    #[error("face match threshold must be within 0..=100 (got {0})")]
    ThresholdOutOfRange(f64),
    #[error("at least one work day is required")]
    NoWorkDays,
}

/// Attendance rules injected into the clock, matcher and pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockPolicy {
    pub work_start_time: NaiveTime,
    pub work_end_time: NaiveTime,
    pub late_threshold_minutes: i64,
    pub early_leave_threshold_minutes: i64,
    pub overtime_threshold_minutes: i64,
    pub standard_day_hours: f64,
    pub face_match_threshold_percent: f64,
    pub work_days: HashSet<Weekday>,
    /// Fixed reporting timezone for date keys and time-of-day rules.
    pub utc_offset: FixedOffset,
}

impl Default for ClockPolicy {
    fn default() -> Self {
        Self {
            work_start_time: NaiveTime::from_hms_opt(9, 0, 0).expect("09:00 is a valid time"),
            work_end_time: NaiveTime::from_hms_opt(18, 0, 0).expect("18:00 is a valid time"),
            late_threshold_minutes: 10,
            early_leave_threshold_minutes: 10,
            overtime_threshold_minutes: 0,
            standard_day_hours: 8.0,
            face_match_threshold_percent: 60.0,
            work_days: [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]
            .into_iter()
            .collect(),
            utc_offset: FixedOffset::east_opt(9 * 3600).expect("+09:00 is a valid offset"),
        }
    }
}

impl ClockPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.work_end_time <= self.work_start_time {
            return Err(PolicyError::WorkDayInverted {
                start: self.work_start_time,
                end: self.work_end_time,
            });
        }

        for (name, value) in [
            ("late_threshold_minutes", self.late_threshold_minutes),
            ("early_leave_threshold_minutes", self.early_leave_threshold_minutes),
            ("overtime_threshold_minutes", self.overtime_threshold_minutes),
        ] {
            if value < 0 {
                return Err(PolicyError::NegativeThreshold { name, value });
            }
        }

        if !(self.standard_day_hours > 0.0) {
            return Err(PolicyError::NonPositiveStandardDay(self.standard_day_hours));
        }

        if !(0.0..=100.0).contains(&self.face_match_threshold_percent) {
            return Err(PolicyError::ThresholdOutOfRange(
                self.face_match_threshold_percent,
            ));
        }

        if self.work_days.is_empty() {
            return Err(PolicyError::NoWorkDays);
        }

        Ok(())
    }

    /// Latest check-in time of day that still counts as on time.
    pub fn late_cutoff(&self) -> NaiveTime {
        self.work_start_time + TimeDelta::minutes(self.late_threshold_minutes)
    }

    /// Check-outs strictly before this time of day are early leaves.
    pub fn early_leave_cutoff(&self) -> NaiveTime {
        self.work_end_time - TimeDelta::minutes(self.early_leave_threshold_minutes)
    }

    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        self.work_days.contains(&date.weekday())
    }
}

/// Parses a comma separated list of ISO weekday numbers (1 = Monday).
pub fn parse_work_days(value: &str) -> anyhow::Result<HashSet<Weekday>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let number: u8 = part
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid work day: {}", part))?;
            match number {
                1 => Ok(Weekday::Mon),
                2 => Ok(Weekday::Tue),
                3 => Ok(Weekday::Wed),
                4 => Ok(Weekday::Thu),
                5 => Ok(Weekday::Fri),
                6 => Ok(Weekday::Sat),
                7 => Ok(Weekday::Sun),
                _ => Err(anyhow::anyhow!("Work day out of range 1-7: {}", number)),
            }
        })
        .collect()
}
