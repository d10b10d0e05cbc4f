//! # WordNest: daily vocabulary over Telegram
//!
//! Usage:
//!   wordnest                          # ~/.wordnest/config.toml + env overrides
//!   wordnest --config ./wordnest.toml # Explicit config file
//!   wordnest --verbose                # Debug logging

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use wordnest_agent::{DialogueOptions, Inbox, WordNestBot};
use wordnest_channels::{HttpProfileSync, TelegramChannel};
use wordnest_core::{Catalog, WordNestConfig};
use wordnest_scheduler::{DeliveryHandler, Scheduler, SystemClock};

#[derive(Parser)]
#[command(name = "wordnest", version, about = "Daily vocabulary lessons on Telegram")]
struct Cli {
    /// Config file (TOML). Defaults to ~/.wordnest/config.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "wordnest=debug,wordnest_agent=debug,wordnest_scheduler=debug,wordnest_store=debug,wordnest_channels=debug"
    } else {
        "wordnest=info,wordnest_agent=info,wordnest_scheduler=info,wordnest_store=info,wordnest_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let path = PathBuf::from(shellexpand::tilde(path).to_string());
            WordNestConfig::load_with_env(&path)
        }
        None => WordNestConfig::load(),
    }
    .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let tz = config.schedule.tz()?;
    let store = wordnest_store::create_store(&config.store).context("Failed to open profile store")?;
    let catalog = Arc::new(Catalog::builtin());

    let telegram = Arc::new(TelegramChannel::new(config.telegram.clone()));
    let me = telegram.get_me().await.context("Telegram token check failed")?;
    tracing::info!(
        "Connected to Telegram as @{}",
        me.username.as_deref().unwrap_or(&me.first_name)
    );

    let delivery = DeliveryHandler::new(
        store.clone(),
        catalog,
        telegram.clone(),
        config.schedule.cursor_policy,
    );
    let scheduler = Scheduler::new(
        tz,
        config.schedule.rearm,
        Arc::new(SystemClock),
        Arc::new(delivery),
    );

    let options = DialogueOptions {
        capture_email: config.dialogue.capture_email,
    };
    let mut bot = WordNestBot::new(store.clone(), scheduler.clone(), telegram.clone(), options);
    if config.sync.enabled {
        bot = bot.with_sync(Arc::new(HttpProfileSync::new(&config.sync)));
    } else {
        tracing::info!("Remote profile sync disabled");
    }
    let bot = Arc::new(bot);

    bot.restore_schedules().await.context("Failed to restore schedules")?;
    tracing::info!(
        "WordNest v{} running (timezone {tz}, store {})",
        env!("CARGO_PKG_VERSION"),
        store.name()
    );

    let inbox = Inbox::new(bot);
    let mut updates = telegram.clone().start_polling();

    loop {
        tokio::select! {
            next = updates.next() => match next {
                Some(msg) => inbox.dispatch(msg),
                None => {
                    tracing::warn!("Telegram update stream ended");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    tracing::info!("Stopping {} active timer(s)", scheduler.active_count());
    scheduler.shutdown();
    Ok(())
}
