use crate::attendance::error::PunchError;
use crate::attendance::pipeline::{FacePunchRequest, PunchRequest};
use crate::bot::{Context, DEVICE, Error};
use crate::database::models::AttendanceRecord;
use crate::utils::format::{
    format_error_message, format_success_message, punch_error_message, status_label,
};
use crate::utils::time::{format_hours, format_time_local};
use chrono::Utc;
use poise::serenity_prelude as serenity;

/// 出勤を記録します
#[poise::command(slash_command)]
pub async fn checkin(
    ctx: Context<'_>,
    #[description = "勤務場所"] location: Option<String>,
) -> Result<(), Error> {
    let request = PunchRequest {
        user_id: ctx.author().id.to_string(),
        at: Utc::now(),
        location,
        device: Some(DEVICE.to_string()),
    };

    let result = ctx.data().pipeline.check_in(request).await;
    reply_check_in(ctx, result).await
}

/// 退勤を記録します
#[poise::command(slash_command)]
pub async fn checkout(
    ctx: Context<'_>,
    #[description = "勤務場所"] location: Option<String>,
) -> Result<(), Error> {
    let request = PunchRequest {
        user_id: ctx.author().id.to_string(),
        at: Utc::now(),
        location,
        device: Some(DEVICE.to_string()),
    };

    let result = ctx.data().pipeline.check_out(request).await;
    reply_check_out(ctx, result).await
}

/// 顔認証で出勤を記録します
#[poise::command(slash_command)]
pub async fn face_checkin(
    ctx: Context<'_>,
    #[description = "顔写真"] photo: serenity::Attachment,
    #[description = "勤務場所"] location: Option<String>,
) -> Result<(), Error> {
    ctx.defer().await?;

    let Some(attempt) = face_attempt(ctx, &photo, location).await? else {
        return Ok(());
    };

    let result = ctx.data().pipeline.face_check_in(attempt).await;
    reply_check_in(ctx, result).await
}

/// 顔認証で退勤を記録します
#[poise::command(slash_command)]
pub async fn face_checkout(
    ctx: Context<'_>,
    #[description = "顔写真"] photo: serenity::Attachment,
    #[description = "勤務場所"] location: Option<String>,
) -> Result<(), Error> {
    ctx.defer().await?;

    let Some(attempt) = face_attempt(ctx, &photo, location).await? else {
        return Ok(());
    };

    let result = ctx.data().pipeline.face_check_out(attempt).await;
    reply_check_out(ctx, result).await
}

/// Downloads the photo. Replies and returns `None` when it cannot be used.
async fn face_attempt(
    ctx: Context<'_>,
    photo: &serenity::Attachment,
    location: Option<String>,
) -> Result<Option<FacePunchRequest>, Error> {
    let image = match download_photo(ctx, photo).await? {
        Some(image) => image,
        None => return Ok(None),
    };

    Ok(Some(FacePunchRequest {
        user_id: ctx.author().id.to_string(),
        image,
        captured_at: Utc::now(),
        location,
        device: Some(DEVICE.to_string()),
    }))
}

pub(crate) async fn download_photo(
    ctx: Context<'_>,
    photo: &serenity::Attachment,
) -> Result<Option<Vec<u8>>, Error> {
    let max_bytes = ctx.data().config.max_image_bytes;
    if photo.size as usize > max_bytes {
        let msg = format_error_message(&format!(
            "画像が大きすぎます（上限 {}MB）",
            max_bytes / (1024 * 1024)
        ));
        ctx.say(msg).await?;
        return Ok(None);
    }

    match photo.download().await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) => {
            tracing::warn!("Failed to download attachment {}: {:?}", photo.filename, e);
            let msg = format_error_message("画像のダウンロードに失敗しました");
            ctx.say(msg).await?;
            Ok(None)
        }
    }
}

async fn reply_check_in(
    ctx: Context<'_>,
    result: Result<AttendanceRecord, PunchError>,
) -> Result<(), Error> {
    let offset = ctx.data().pipeline.policy().utc_offset;

    let msg = match result {
        Ok(record) => {
            let mut text = format!(
                "出勤しました（{} / {}）",
                record
                    .check_in_at
                    .map(|at| format_time_local(at, offset))
                    .unwrap_or_default(),
                status_label(record.status)
            );
            if let Some(score) = record.check_in_face_score {
                text.push_str(&format!("\n顔認証一致度: {:.2}%", score));
            }
            format_success_message(&text)
        }
        Err(e) => punch_failure(&e),
    };

    ctx.say(msg).await?;
    Ok(())
}

async fn reply_check_out(
    ctx: Context<'_>,
    result: Result<AttendanceRecord, PunchError>,
) -> Result<(), Error> {
    let offset = ctx.data().pipeline.policy().utc_offset;

    let msg = match result {
        Ok(record) => {
            let mut text = format!(
                "退勤しました（{}）\n勤務時間: {}",
                record
                    .check_out_at
                    .map(|at| format_time_local(at, offset))
                    .unwrap_or_default(),
                format_hours(record.work_hours)
            );
            if record.overtime_hours > 0.0 {
                text.push_str(&format!("\n残業時間: {}", format_hours(record.overtime_hours)));
            }
            if record.is_early_leave {
                text.push_str("\n※ 早退として記録されました");
            }
            if let Some(score) = record.check_out_face_score {
                text.push_str(&format!("\n顔認証一致度: {:.2}%", score));
            }
            format_success_message(&text)
        }
        Err(e) => punch_failure(&e),
    };

    ctx.say(msg).await?;
    Ok(())
}

pub(crate) fn punch_failure(error: &PunchError) -> String {
    match error {
        PunchError::StoreUnavailable(_) | PunchError::ExtractorUnavailable(_) => {
            tracing::error!("Punch failed: {}", error);
        }
        _ => tracing::debug!("Punch rejected: {}", error),
    }
    format_error_message(&punch_error_message(error))
}
