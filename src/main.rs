mod attendance;
mod bot;
mod config;
mod database;
mod utils;

use anyhow::Result;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "face_kintai=info,attendance_events=info,poise=info".into()
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        "Attendance policy: {}-{} (UTC{}), face verification {}",
        config.policy.work_start_time.format("%H:%M"),
        config.policy.work_end_time.format("%H:%M"),
        config.policy.utc_offset,
        if config.face_extractor_url.is_some() { "enabled" } else { "disabled" }
    );

    // Create and start the bot
    let mut client = bot::create_bot(config).await?;

    tracing::info!("Starting Discord bot...");

    if let Err(why) = client.start().await {
        tracing::error!("Client error: {:?}", why);
    }

    Ok(())
}
