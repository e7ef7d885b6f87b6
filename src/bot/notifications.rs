use crate::attendance::events::{DomainEvent, EventSink, TracingEventSink};
use crate::database::queries;
use crate::utils::format::format_event;
use poise::serenity_prelude as serenity;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Drains pipeline events: logs each one, records the correction audit trail
/// and posts a notice to the configured channel.
pub async fn forward_events(
    http: Arc<serenity::Http>,
    pool: SqlitePool,
    channel: Option<serenity::ChannelId>,
    mut receiver: mpsc::UnboundedReceiver<DomainEvent>,
) {
    let log = TracingEventSink;

    while let Some(event) = receiver.recv().await {
        log.emit(event.clone());
        record_correction(&pool, &event).await;

        if let Some(channel) = channel {
            if let Err(e) = channel.say(&*http, format_event(&event)).await {
                tracing::warn!("Failed to post attendance notice: {:?}", e);
            }
        }
    }

    tracing::info!("Event stream closed");
}

/// Appends a correction to the audit log, stamped with the time it was made.
async fn record_correction(pool: &SqlitePool, event: &DomainEvent) {
    let DomainEvent::AttendanceCorrected {
        user_id,
        date,
        actor_id,
        reason,
        corrected_at,
    } = event
    else {
        return;
    };

    if let Err(e) =
        queries::insert_correction_log(pool, user_id, *date, actor_id, reason, *corrected_at)
            .await
    {
        tracing::error!(
            "Failed to store correction log for user_id={}, date={}: {}",
            user_id,
            date,
            e
        );
    }
}
