use crate::attendance::clock::{Correction, PunchCorrection, StatusOverride};
use crate::bot::commands::attendance::{download_photo, punch_failure};
use crate::bot::{Context, Error};
use crate::database::models::FaceEnrollment;
use crate::database::queries;
use crate::utils::format::{format_error_message, format_success_message, status_label};
use crate::utils::time::{combine_date_time, current_date, format_hours};
use crate::utils::validation::{
    validate_date_format, validate_date_not_future, validate_reason,
    validate_reasonable_past_date, validate_time_format,
};
use chrono::{NaiveDate, Utc};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum LeaveKind {
    #[name = "休暇"]
    Leave,
    #[name = "祝日"]
    Holiday,
    #[name = "解除"]
    Clear,
}

impl From<LeaveKind> for StatusOverride {
    fn from(kind: LeaveKind) -> Self {
        match kind {
            LeaveKind::Leave => StatusOverride::Leave,
            LeaveKind::Holiday => StatusOverride::Holiday,
            LeaveKind::Clear => StatusOverride::Clear,
        }
    }
}

async fn is_admin(ctx: Context<'_>) -> Result<bool, Error> {
    let Some(role_id) = ctx.data().config.admin_role_id.as_deref() else {
        ctx.say(format_error_message("管理者ロールが設定されていません"))
            .await?;
        return Ok(false);
    };
    let role_id = serenity::RoleId::new(role_id.trim().parse::<u64>()?);

    let is_admin = match ctx.author_member().await {
        Some(member) => member.roles.contains(&role_id),
        None => false,
    };

    if !is_admin {
        tracing::warn!(
            "Rejected admin command from user_id={}",
            ctx.author().id
        );
        ctx.say(format_error_message("この操作には管理者権限が必要です"))
            .await?;
    }

    Ok(is_admin)
}

/// Parses and range-checks a date typed by an administrator. Replies on failure.
async fn admin_date(
    ctx: Context<'_>,
    date: &str,
    allow_future: bool,
) -> Result<Option<NaiveDate>, Error> {
    let today = current_date(ctx.data().pipeline.policy().utc_offset);

    let checked = validate_date_format(date).and_then(|date| {
        if !allow_future {
            validate_date_not_future(date, today)?;
        }
        validate_reasonable_past_date(date, today)?;
        Ok(date)
    });

    match checked {
        Ok(date) => Ok(Some(date)),
        Err(e) => {
            ctx.say(format_error_message(&e.to_string())).await?;
            Ok(None)
        }
    }
}

fn punch_correction(
    date: NaiveDate,
    time: Option<&str>,
    clear: bool,
    ctx: Context<'_>,
) -> anyhow::Result<PunchCorrection> {
    match (time, clear) {
        (Some(_), true) => Err(anyhow::anyhow!(
            "時刻の指定と取り消しは同時に指定できません"
        )),
        (Some(time), false) => {
            let time = validate_time_format(time)?;
            Ok(PunchCorrection::Set(combine_date_time(
                date,
                time,
                ctx.data().pipeline.policy().utc_offset,
            )))
        }
        (None, true) => Ok(PunchCorrection::Clear),
        (None, false) => Ok(PunchCorrection::Keep),
    }
}

/// 勤怠記録を修正します（管理者用）
#[poise::command(slash_command, check = "is_admin")]
pub async fn correct(
    ctx: Context<'_>,
    #[description = "対象ユーザー"] user: serenity::User,
    #[description = "対象日 (YYYY-MM-DD)"] date: String,
    #[description = "修正理由"] reason: String,
    #[description = "出勤時刻 (HH:MM)"] check_in: Option<String>,
    #[description = "退勤時刻 (HH:MM)"] check_out: Option<String>,
    #[description = "出勤記録を取り消す"] clear_check_in: Option<bool>,
    #[description = "退勤記録を取り消す"] clear_check_out: Option<bool>,
) -> Result<(), Error> {
    let Some(date) = admin_date(ctx, &date, false).await? else {
        return Ok(());
    };

    let corrections = validate_reason(&reason).and_then(|_| {
        Ok((
            punch_correction(
                date,
                check_in.as_deref(),
                clear_check_in.unwrap_or(false),
                ctx,
            )?,
            punch_correction(
                date,
                check_out.as_deref(),
                clear_check_out.unwrap_or(false),
                ctx,
            )?,
        ))
    });
    let (check_in, check_out) = match corrections {
        Ok(corrections) => corrections,
        Err(e) => {
            ctx.say(format_error_message(&e.to_string())).await?;
            return Ok(());
        }
    };

    if check_in == PunchCorrection::Keep && check_out == PunchCorrection::Keep {
        ctx.say(format_error_message("修正する項目を指定してください"))
            .await?;
        return Ok(());
    }

    let correction = Correction {
        actor_id: ctx.author().id.to_string(),
        check_in,
        check_out,
        reason: reason.trim().to_string(),
        at: Utc::now(),
    };

    let msg = match ctx
        .data()
        .pipeline
        .correct(&user.id.to_string(), date, correction)
        .await
    {
        Ok(record) => format_success_message(&format!(
            "{} の {} の記録を修正しました（{} / 勤務時間 {}）",
            user.name,
            date.format("%Y-%m-%d"),
            status_label(record.status),
            format_hours(record.work_hours)
        )),
        Err(e) => punch_failure(&e),
    };

    ctx.say(msg).await?;
    Ok(())
}

/// 休暇・祝日を設定します（管理者用）
#[poise::command(slash_command, check = "is_admin")]
pub async fn leave(
    ctx: Context<'_>,
    #[description = "対象ユーザー"] user: serenity::User,
    #[description = "対象日 (YYYY-MM-DD)"] date: String,
    #[description = "種別"] kind: LeaveKind,
) -> Result<(), Error> {
    let Some(date) = admin_date(ctx, &date, true).await? else {
        return Ok(());
    };

    let msg = match ctx
        .data()
        .pipeline
        .override_status(
            &user.id.to_string(),
            date,
            kind.into(),
            &ctx.author().id.to_string(),
            Utc::now(),
        )
        .await
    {
        Ok(record) => format_success_message(&format!(
            "{} の {} を「{}」に設定しました",
            user.name,
            date.format("%Y-%m-%d"),
            status_label(record.status)
        )),
        Err(e) => punch_failure(&e),
    };

    ctx.say(msg).await?;
    Ok(())
}

/// 顔認証用の顔情報を登録します（管理者用）
#[poise::command(slash_command, check = "is_admin")]
pub async fn enroll(
    ctx: Context<'_>,
    #[description = "対象ユーザー"] user: serenity::User,
    #[description = "顔写真"] photo: serenity::Attachment,
) -> Result<(), Error> {
    ctx.defer().await?;

    let Some(image) = download_photo(ctx, &photo).await? else {
        return Ok(());
    };

    let (vector, model_version) = match ctx.data().pipeline.extract_features(&image).await {
        Ok(features) => features,
        Err(e) => {
            ctx.say(punch_failure(&e)).await?;
            return Ok(());
        }
    };

    let enrollment = FaceEnrollment {
        user_id: user.id.to_string(),
        vector,
        model_version,
        updated_at: Utc::now(),
    };

    match queries::replace_enrollment(&ctx.data().pool, &enrollment).await {
        Ok(()) => {
            tracing::info!(
                "Face enrollment stored: user_id={}, model={}, actor={}",
                enrollment.user_id,
                enrollment.model_version,
                ctx.author().id
            );
            ctx.say(format_success_message(&format!(
                "{} の顔情報を登録しました",
                user.name
            )))
            .await?;
        }
        Err(e) => {
            tracing::error!("Failed to store enrollment for {}: {}", enrollment.user_id, e);
            ctx.say(format_error_message("顔情報の保存に失敗しました"))
                .await?;
        }
    }

    Ok(())
}
