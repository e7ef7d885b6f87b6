pub mod commands;
pub mod handlers;
pub mod notifications;

use crate::attendance::events::ChannelEventSink;
use crate::attendance::extractor::HttpFaceExtractor;
use crate::attendance::pipeline::AttendanceVerificationPipeline;
use crate::config::Config;
use crate::database;
use crate::database::store::SqliteStore;
use sqlx::SqlitePool;
use anyhow::Result;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Device tag stored on punches made through slash commands.
pub const DEVICE: &str = "discord";

#[derive(Clone)]
pub struct Data {
    pub pool: SqlitePool,
    pub config: Config,
    pub pipeline: Arc<AttendanceVerificationPipeline>,
}

pub async fn create_bot(config: Config) -> Result<serenity::Client> {
    let pool = database::create_connection(&config.database_url).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let (events, receiver) = ChannelEventSink::new();

    let mut pipeline = AttendanceVerificationPipeline::new(
        config.policy.clone(),
        store.clone(),
        store,
        Arc::new(events),
    )
    .with_max_image_bytes(config.max_image_bytes);
    if let Some(url) = &config.face_extractor_url {
        pipeline = pipeline.with_face_extractor(
            Arc::new(HttpFaceExtractor::new(url)),
            config.face_extraction_timeout,
        );
    }

    let data = Data {
        pool: pool.clone(),
        config: config.clone(),
        pipeline: Arc::new(pipeline),
    };
    let notify_channel = config.notify_channel_id.map(serenity::ChannelId::new);

    let intents = serenity::GatewayIntents::non_privileged();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::attendance::checkin(),
                commands::attendance::checkout(),
                commands::attendance::face_checkin(),
                commands::attendance::face_checkout(),
                commands::status::status(),
                commands::reports::weekly(),
                commands::reports::monthly(),
                commands::admin::correct(),
                commands::admin::leave(),
                commands::admin::enroll(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tokio::spawn(notifications::forward_events(
                    ctx.http.clone(),
                    pool,
                    notify_channel,
                    receiver,
                ));
                Ok(data)
            })
        })
        .build();

    let client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await?;

    Ok(client)
}
