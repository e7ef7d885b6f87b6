use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};

pub fn local_datetime(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDateTime {
    timestamp.with_timezone(&offset).naive_local()
}

pub fn local_date(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    local_datetime(timestamp, offset).date()
}

pub fn local_time(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveTime {
    local_datetime(timestamp, offset).time()
}

pub fn current_date(offset: FixedOffset) -> NaiveDate {
    local_date(Utc::now(), offset)
}

pub fn combine_date_time(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let utc_naive =
        date.and_time(time) - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
    utc_naive.and_utc()
}

pub fn parse_time_string(time_str: &str) -> Result<NaiveTime> {
    let time_str = time_str.trim();

    if let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M") {
        return Ok(time);
    }

    if let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M:%S") {
        return Ok(time);
    }

    Err(anyhow::anyhow!("Invalid time format. Use HH:MM or HH:MM:SS"))
}

pub fn parse_date_string(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date format. Use YYYY-MM-DD"))
}

/// Hours between two instants, rounded to two decimals.
pub fn hours_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    round_hundredths(end.signed_duration_since(start).num_seconds() as f64 / 3600.0)
}

pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn format_hours(hours: f64) -> String {
    let total_minutes = (hours * 60.0).round() as i64;
    let h = total_minutes / 60;
    let m = total_minutes % 60;

    if h > 0 {
        format!("{}時間{}分", h, m)
    } else {
        format!("{}分", m)
    }
}

pub fn format_time_local(datetime: DateTime<Utc>, offset: FixedOffset) -> String {
    datetime.with_timezone(&offset).format("%H:%M").to_string()
}

pub fn format_datetime_local(datetime: DateTime<Utc>, offset: FixedOffset) -> String {
    datetime
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string()
}
