use crate::attendance::policy::{ClockPolicy, parse_work_days};
use crate::utils::time::parse_time_string;
use anyhow::{Context, Result};
use chrono::FixedOffset;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub admin_role_id: Option<String>,
    pub notify_channel_id: Option<u64>,
    pub face_extractor_url: Option<String>,
    pub face_extraction_timeout: Duration,
    pub max_image_bytes: usize,
    pub policy: ClockPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN environment variable is required"))?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:attendance.db".to_string());

        let admin_role_id = env::var("ADMIN_ROLE_ID").ok();
        let notify_channel_id = optional_var::<u64>("NOTIFY_CHANNEL_ID")?;
        let face_extractor_url = env::var("FACE_EXTRACTOR_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let face_extraction_timeout =
            Duration::from_secs(var_or("FACE_EXTRACTION_TIMEOUT_SECS", 10u64)?);
        let max_image_bytes = var_or("MAX_IMAGE_BYTES", 10 * 1024 * 1024usize)?;

        let policy = policy_from_env()?;
        policy
            .validate()
            .context("Invalid attendance policy configuration")?;

        Ok(Config {
            discord_token,
            database_url,
            admin_role_id,
            notify_channel_id,
            face_extractor_url,
            face_extraction_timeout,
            max_image_bytes,
            policy,
        })
    }
}

fn policy_from_env() -> Result<ClockPolicy> {
    let defaults = ClockPolicy::default();

    let work_start_time = match env::var("WORK_START_TIME") {
        Ok(value) => parse_time_string(&value).context("WORK_START_TIME")?,
        Err(_) => defaults.work_start_time,
    };
    let work_end_time = match env::var("WORK_END_TIME") {
        Ok(value) => parse_time_string(&value).context("WORK_END_TIME")?,
        Err(_) => defaults.work_end_time,
    };
    let work_days = match env::var("WORK_DAYS") {
        Ok(value) => parse_work_days(&value).context("WORK_DAYS")?,
        Err(_) => defaults.work_days,
    };

    let offset_hours: i32 = var_or("UTC_OFFSET_HOURS", 9)?;
    let utc_offset = FixedOffset::east_opt(offset_hours * 3600)
        .ok_or_else(|| anyhow::anyhow!("UTC_OFFSET_HOURS out of range: {}", offset_hours))?;

    Ok(ClockPolicy {
        work_start_time,
        work_end_time,
        late_threshold_minutes: var_or(
            "LATE_THRESHOLD_MINUTES",
            defaults.late_threshold_minutes,
        )?,
        early_leave_threshold_minutes: var_or(
            "EARLY_LEAVE_THRESHOLD_MINUTES",
            defaults.early_leave_threshold_minutes,
        )?,
        overtime_threshold_minutes: var_or(
            "OVERTIME_THRESHOLD_MINUTES",
            defaults.overtime_threshold_minutes,
        )?,
        standard_day_hours: var_or("STANDARD_DAY_HOURS", defaults.standard_day_hours)?,
        face_match_threshold_percent: var_or(
            "FACE_MATCH_THRESHOLD_PERCENT",
            defaults.face_match_threshold_percent,
        )?,
        work_days,
        utc_offset,
    })
}

fn optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {} ({})", name, value, e)),
        Err(_) => Ok(None),
    }
}

fn var_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(optional_var(name)?.unwrap_or(default))
}
