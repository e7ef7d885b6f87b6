use crate::bot::{Context, Error};
use crate::database::queries;
use crate::utils::format::{create_error_embed, create_status_embed};
use crate::utils::time::current_date;

/// 今日の勤務状況を確認します
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.to_string();
    let username = ctx.author().name.clone();
    let data = ctx.data();
    let offset = data.pipeline.policy().utc_offset;
    let today = current_date(offset);

    let record = match data.pipeline.record_for(&user_id, today).await {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Failed to load attendance for {}: {}", user_id, e);
            let embed =
                create_error_embed("エラー", &format!("勤務記録の取得に失敗しました: {}", e));
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
            return Ok(());
        }
    };

    let corrections = match &record {
        Some(record) if record.is_corrected => {
            queries::get_correction_logs(&data.pool, &user_id, today)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("Failed to load correction history for {}: {}", user_id, e);
                    Vec::new()
                })
        }
        _ => Vec::new(),
    };

    let embed = create_status_embed(&username, today, record.as_ref(), &corrections, offset);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}
