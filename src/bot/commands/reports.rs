use crate::bot::{Context, Error};
use crate::database::queries;
use crate::utils::format::{create_error_embed, create_report_embed};
use crate::utils::time::current_date;
use chrono::{Datelike, Days, NaiveDate};

/// 今週の勤務レポートを表示します
#[poise::command(slash_command)]
pub async fn weekly(ctx: Context<'_>) -> Result<(), Error> {
    let today = current_date(ctx.data().pipeline.policy().utc_offset);
    let days_since_monday = today.weekday().num_days_from_monday() as u64;
    let start_of_week = today
        .checked_sub_days(Days::new(days_since_monday))
        .unwrap_or(today);

    send_report(ctx, "週次レポート", start_of_week, today).await
}

/// 今月の勤務レポートを表示します
#[poise::command(slash_command)]
pub async fn monthly(ctx: Context<'_>) -> Result<(), Error> {
    let today = current_date(ctx.data().pipeline.policy().utc_offset);
    let start_of_month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);

    send_report(ctx, "月次レポート", start_of_month, today).await
}

async fn send_report(
    ctx: Context<'_>,
    title: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), Error> {
    let user_id = ctx.author().id.to_string();
    let username = ctx.author().name.clone();
    let data = ctx.data();

    match queries::get_records_by_date_range(&data.pool, &user_id, start, end).await {
        Ok(records) => {
            let date_range = format!(
                "{} ～ {}",
                start.format("%Y年%m月%d日"),
                end.format("%Y年%m月%d日")
            );

            let embed = create_report_embed(
                &username,
                title,
                &date_range,
                &records,
                data.pipeline.policy().utc_offset,
            );

            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(e) => {
            tracing::error!("Failed to load report for {}: {}", user_id, e);
            let embed =
                create_error_embed("エラー", &format!("勤務記録の取得に失敗しました: {}", e));
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
    }

    Ok(())
}
