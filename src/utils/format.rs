use crate::attendance::error::PunchError;
use crate::attendance::events::DomainEvent;
use crate::attendance::stats::AttendanceSummary;
use crate::database::models::{AttendanceRecord, AttendanceStatus, CorrectionLog};
use crate::utils::time::{format_datetime_local, format_hours, format_time_local};
use chrono::FixedOffset;
use poise::serenity_prelude as serenity;

pub fn status_label(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Present => "出勤",
        AttendanceStatus::Late => "遅刻",
        AttendanceStatus::EarlyLeave => "早退",
        AttendanceStatus::Absent => "欠勤",
        AttendanceStatus::Leave => "休暇",
        AttendanceStatus::Holiday => "祝日",
        AttendanceStatus::Weekend => "休日",
        AttendanceStatus::Overtime => "残業",
    }
}

pub fn punch_error_message(error: &PunchError) -> String {
    match error {
        PunchError::AlreadyCheckedIn => "本日は既に出勤済みです".to_string(),
        PunchError::AlreadyCheckedOut => "本日は既に退勤済みです".to_string(),
        PunchError::ShiftTooLong => {
            "出勤から24時間以上経過しています。管理者に修正を依頼してください。".to_string()
        }
        PunchError::NotCheckedInYet => {
            "出勤記録がありません。先に `/checkin` で出勤してください。".to_string()
        }
        PunchError::NoEnrollment => {
            "顔情報が登録されていません。管理者に登録を依頼してください。".to_string()
        }
        PunchError::NoFaceDetected => {
            "画像から顔を検出できませんでした。正面から撮影し直してください。".to_string()
        }
        PunchError::MatchRejected { score } => {
            format!("顔認証に失敗しました（一致度: {:.2}%）", score)
        }
        PunchError::DimensionMismatch { .. } | PunchError::EnrollmentModelMismatch { .. } => {
            "登録済みの顔情報が現在の認証方式と一致しません。再登録してください。".to_string()
        }
        PunchError::InvalidImage(reason) => format!("画像を読み込めませんでした: {}", reason),
        PunchError::ExtractionTimeout => {
            "顔認証がタイムアウトしました。しばらくしてから再度お試しください。".to_string()
        }
        PunchError::ExtractorUnavailable(_) => "顔認証は現在利用できません".to_string(),
        PunchError::InvalidCorrection(reason) => format!("修正内容が正しくありません: {}", reason),
        PunchError::StoreUnavailable(_) => {
            "勤怠データの保存に失敗しました。しばらくしてから再度お試しください。".to_string()
        }
    }
}

pub fn format_record(record: &AttendanceRecord, offset: FixedOffset) -> String {
    let mut text = String::new();

    text.push_str(&format!(
        "📌 **ステータス**: {}",
        status_label(record.status)
    ));
    if record.is_late && record.status != AttendanceStatus::Late {
        text.push_str(" (遅刻)");
    }
    if record.is_early_leave {
        text.push_str(" (早退)");
    }
    text.push('\n');

    match record.check_in_at {
        Some(at) => {
            text.push_str(&format!("🟢 **出勤**: {}", format_time_local(at, offset)));
            push_punch_details(
                &mut text,
                record.check_in_location.as_deref(),
                record.check_in_face_score,
            );
        }
        None => text.push_str("🟢 **出勤**: 未打刻\n"),
    }

    match record.check_out_at {
        Some(at) => {
            text.push_str(&format!("🔴 **退勤**: {}", format_time_local(at, offset)));
            push_punch_details(
                &mut text,
                record.check_out_location.as_deref(),
                record.check_out_face_score,
            );
        }
        None if record.check_in_at.is_some() => text.push_str("⚠️ **現在勤務中**\n"),
        None => {}
    }

    if record.work_hours > 0.0 {
        text.push_str(&format!(
            "⏱️ **勤務時間**: {}\n",
            format_hours(record.work_hours)
        ));
    }
    if record.overtime_hours > 0.0 {
        text.push_str(&format!(
            "🌙 **残業時間**: {}\n",
            format_hours(record.overtime_hours)
        ));
    }
    if record.is_corrected {
        text.push_str("✏️ 管理者により修正済み\n");
    }

    text
}

fn push_punch_details(text: &mut String, location: Option<&str>, face_score: Option<f64>) {
    if let Some(location) = location {
        text.push_str(&format!(" @ {}", location));
    }
    if let Some(score) = face_score {
        text.push_str(&format!(" (顔認証 {:.1}%)", score));
    }
    text.push('\n');
}

pub fn format_summary(summary: &AttendanceSummary) -> String {
    if summary.total_days == 0 {
        return "指定期間に勤務記録がありません".to_string();
    }

    let mut text = format!("📅 **記録日数**: {}日\n", summary.total_days);

    let breakdown: Vec<String> = summary
        .status_counts
        .iter()
        .map(|(status, count)| format!("{} {}日", status_label(*status), count))
        .collect();
    text.push_str(&format!("📊 **内訳**: {}\n", breakdown.join(" / ")));

    if summary.late_count > 0 || summary.early_leave_count > 0 {
        text.push_str(&format!(
            "⏰ **遅刻**: {}回 / **早退**: {}回\n",
            summary.late_count, summary.early_leave_count
        ));
    }

    text.push_str(&format!(
        "⏱️ **合計勤務時間**: {}\n",
        format_hours(summary.total_work_hours)
    ));
    if summary.average_work_hours > 0.0 {
        text.push_str(&format!(
            "📈 **平均勤務時間**: {}\n",
            format_hours(summary.average_work_hours)
        ));
    }
    if summary.total_overtime_hours > 0.0 {
        text.push_str(&format!(
            "🌙 **合計残業時間**: {}\n",
            format_hours(summary.total_overtime_hours)
        ));
    }

    text
}

pub fn format_daily_lines(records: &[AttendanceRecord], offset: FixedOffset) -> String {
    records
        .iter()
        .map(|record| {
            let check_in = record
                .check_in_at
                .map(|at| format_time_local(at, offset))
                .unwrap_or_else(|| "--:--".to_string());
            let check_out = record
                .check_out_at
                .map(|at| format_time_local(at, offset))
                .unwrap_or_else(|| "--:--".to_string());
            format!(
                "`{}` {} → {} {}",
                record.date.format("%m/%d (%a)"),
                check_in,
                check_out,
                status_label(record.status)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One-line notice posted to the notification channel.
pub fn format_event(event: &DomainEvent) -> String {
    match event {
        DomainEvent::AttendanceCheckedIn {
            user_id,
            date,
            status,
            via_face,
        } => format!(
            "🟢 <@{}> が出勤しました（{} / {}{}）",
            user_id,
            date.format("%m/%d"),
            status_label(*status),
            if *via_face { " / 顔認証" } else { "" }
        ),
        DomainEvent::AttendanceCheckedOut {
            user_id,
            date,
            work_hours,
            via_face,
        } => format!(
            "🔴 <@{}> が退勤しました（{} / {}{}）",
            user_id,
            date.format("%m/%d"),
            format_hours(*work_hours),
            if *via_face { " / 顔認証" } else { "" }
        ),
        DomainEvent::AttendanceCorrected {
            user_id,
            date,
            actor_id,
            reason,
            ..
        } => format!(
            "✏️ <@{}> が <@{}> の {} の記録を修正しました: {}",
            actor_id,
            user_id,
            date.format("%Y-%m-%d"),
            reason
        ),
        DomainEvent::AttendanceStatusOverridden {
            user_id,
            date,
            status,
            actor_id,
        } => format!(
            "📝 <@{}> が <@{}> の {} を「{}」に設定しました",
            actor_id,
            user_id,
            date.format("%Y-%m-%d"),
            status_label(*status)
        ),
    }
}

pub fn format_error_message(error: &str) -> String {
    format!("❌ **エラー**: {}", error)
}

pub fn format_success_message(message: &str) -> String {
    format!("✅ {}", message)
}

// Embed utility functions
pub fn create_error_embed(title: &str, description: &str) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .color(0xff0000) // Red
        .timestamp(chrono::Utc::now())
}

pub fn create_status_embed(
    username: &str,
    date: chrono::NaiveDate,
    record: Option<&AttendanceRecord>,
    corrections: &[CorrectionLog],
    offset: FixedOffset,
) -> serenity::CreateEmbed {
    let mut description = match record {
        Some(record) => format_record(record, offset),
        None => "今日はまだ勤務記録がありません".to_string(),
    };

    if !corrections.is_empty() {
        description.push_str("\n**修正履歴:**\n");
        for log in corrections {
            description.push_str(&format!(
                "・{} <@{}>: {}\n",
                format_datetime_local(log.created_at, offset),
                log.actor_id,
                log.reason
            ));
        }
    }

    serenity::CreateEmbed::new()
        .title("📊 勤務状況")
        .description(description)
        .color(0x3498db) // Blue
        .author(serenity::CreateEmbedAuthor::new(format!("{} の勤務状況", username)))
        .footer(serenity::CreateEmbedFooter::new(date.format("%Y年%m月%d日").to_string()))
        .timestamp(chrono::Utc::now())
}

pub fn create_report_embed(
    username: &str,
    title: &str,
    date_range: &str,
    records: &[AttendanceRecord],
    offset: FixedOffset,
) -> serenity::CreateEmbed {
    let summary = AttendanceSummary::from_records(records);
    let mut description = format_summary(&summary);
    if !records.is_empty() {
        description.push('\n');
        description.push_str(&format_daily_lines(records, offset));
    }

    serenity::CreateEmbed::new()
        .title(format!("📅 {}", title))
        .description(description)
        .color(0x9b59b6) // Purple
        .author(serenity::CreateEmbedAuthor::new(format!("{} のレポート", username)))
        .footer(serenity::CreateEmbedFooter::new(date_range))
        .timestamp(chrono::Utc::now())
}
