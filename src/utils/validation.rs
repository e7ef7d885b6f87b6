use crate::utils::time::{parse_date_string, parse_time_string};
use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};

const MAX_REASON_CHARS: usize = 500;
const MAX_PAST_DAYS: i64 = 365;

pub fn validate_time_format(time_str: &str) -> Result<NaiveTime> {
    parse_time_string(time_str)
        .map_err(|_| anyhow::anyhow!("時刻の形式が正しくありません（HH:MM）: {}", time_str))
}

pub fn validate_date_format(date_str: &str) -> Result<NaiveDate> {
    parse_date_string(date_str)
        .map_err(|_| anyhow::anyhow!("日付の形式が正しくありません（YYYY-MM-DD）: {}", date_str))
}

pub fn validate_date_not_future(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date > today {
        return Err(anyhow::anyhow!(
            "未来の日付を指定することはできません"
        ));
    }

    Ok(())
}

pub fn validate_reasonable_past_date(date: NaiveDate, today: NaiveDate) -> Result<()> {
    let days_ago = today.signed_duration_since(date).num_days();

    if days_ago > MAX_PAST_DAYS {
        return Err(anyhow::anyhow!(
            "1年以上前の日付は指定できません"
        ));
    }

    Ok(())
}

pub fn validate_reason(reason: &str) -> Result<()> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(anyhow::anyhow!("修正理由を入力してください"));
    }
    if reason.chars().count() > MAX_REASON_CHARS {
        return Err(anyhow::anyhow!(
            "修正理由は{}文字以内で入力してください",
            MAX_REASON_CHARS
        ));
    }

    Ok(())
}
