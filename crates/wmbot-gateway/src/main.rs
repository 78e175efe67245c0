use clap::Parser;
use tracing::info;

use wmbot_core::config::WmbotConfig;

mod app;

/// Telegram bot that stamps a per-chat PNG watermark onto photos and videos.
#[derive(Parser, Debug)]
#[command(name = "wmbot")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("WMBOT_GIT_SHA"), ")"), about)]
struct Args {
    /// Path to the TOML config (default: $WMBOT_CONFIG, then ~/.wmbot/wmbot.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "wmbot=info,wmbot_pipeline=info,wmbot_storage=info,wmbot_compositor=info,wmbot_telegram=info"
                    .into()
            }),
        )
        .init();

    let args = Args::parse();

    // config path: --config > WMBOT_CONFIG env > ~/.wmbot/wmbot.toml
    let config_path = args.config.or_else(|| std::env::var("WMBOT_CONFIG").ok());
    let config = WmbotConfig::load(config_path.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("WMBOT_GIT_SHA"),
        storage = %config.storage.root,
        database = %config.database.path,
        workers = config.pool.workers,
        ffmpeg = %config.compositor.binary,
        "configuration loaded"
    );

    if args.check {
        info!("configuration OK");
        return Ok(());
    }

    let app = app::App::build(&config)?;
    let pool = app.pool.clone();

    app.adapter.run().await;

    info!(in_flight = pool.in_flight(), "waiting for running requests");
    pool.shutdown().await;
    info!("wmbot stopped");
    Ok(())
}
