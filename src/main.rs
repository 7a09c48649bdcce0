//! # narasla
//!
//! Save-now-read-later Telegram bot with a daily random digest.
//!
//! Usage:
//!   narasla                              # ~/.narasla/config.toml, env overrides
//!   narasla --config ./narasla.toml      # Explicit config file
//!   narasla --verbose                    # Debug logging

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use narasla_agent::{CommandProcessor, EventConsumer};
use narasla_channels::{TelegramClient, TelegramEvents};
use narasla_core::config::NaraslaConfig;
use narasla_core::traits::SchedulerStorage;
use narasla_scheduler::DigestScheduler;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "narasla", version, about = "📚 narasla: save now, read later")]
struct Cli {
    /// Config file (defaults to ~/.narasla/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = ["narasla", "narasla_core", "narasla_agent", "narasla_channels", "narasla_memory", "narasla_scheduler"]
        .map(|target| format!("{target}={level}"))
        .join(",");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref().map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()));
    let config = NaraslaConfig::load(config_path.as_deref()).context("loading config")?;
    config.validate().context("invalid config")?;

    let storage = narasla_memory::create_storage(&config.storage)?;
    let client = Arc::new(TelegramClient::new(config.telegram.clone())?);
    match client.get_me().await {
        Ok(me) => tracing::info!("🤖 Logged in as @{}", me.username.unwrap_or(me.first_name)),
        Err(e) => tracing::warn!("getMe failed, continuing: {e}"),
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let processor = Arc::new(CommandProcessor::new(
        client.clone(),
        storage.clone(),
        config.consumer.event_deadline(),
    ));
    let consumer = EventConsumer::from_config(
        Arc::new(TelegramEvents::new(client.clone())),
        processor,
        &config.consumer,
    );

    let scheduler = if config.scheduler.enabled {
        let storage: Arc<dyn SchedulerStorage> = storage;
        let scheduler = DigestScheduler::from_config(storage, client, &config.scheduler);
        let cancel = cancel.clone();
        Some(tokio::spawn(async move { scheduler.run(cancel).await }))
    } else {
        tracing::info!("⏰ Digest scheduler disabled");
        None
    };

    println!("📚 narasla v{}", env!("CARGO_PKG_VERSION"));
    let consumed = consumer.start(cancel.clone()).await;

    // The consumer only returns on shutdown or a fatal error; stop the scheduler either way.
    cancel.cancel();
    if let Some(handle) = scheduler {
        match handle.await {
            Ok(Err(e)) if !e.is_cancellation() => tracing::warn!("scheduler stopped with error: {e}"),
            Ok(_) => {}
            Err(e) => tracing::error!("scheduler task panicked: {e}"),
        }
    }

    match consumed {
        Err(e) if !e.is_cancellation() => Err(anyhow::anyhow!("consumer stopped: {e}")),
        _ => {
            tracing::info!("👋 narasla stopped");
            Ok(())
        }
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown requested");
    cancel.cancel();
}
