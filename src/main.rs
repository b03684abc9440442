// ABOUTME: Main entry point for the Slack to codex bridge.
// ABOUTME: Loads config, authenticates with Slack, and feeds Socket Mode events to the dispatcher.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use threadbridge::{cli::Cli, slack::SlackConnection};
use threadbridge_core::{metrics, Config, ConcurrencyGate, Dispatcher, HistoryStore};
use threadbridge_agent::{AssistantBackend, CodexRunner};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Log panics before they take the process down
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("[FAIL] {:#}", e);
            std::process::exit(2);
        }
    };

    tracing::info!(config = ?config, "Configuration loaded");

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr)?;
    }

    let slack = SlackConnection::connect(&config.app_token, &config.bot_token).await?;

    let history = Arc::new(HistoryStore::open(config.state_path.clone(), config.history_turns));

    let backend: Arc<dyn AssistantBackend> = Arc::new(CodexRunner::new(config.codex_config()));
    let dispatcher = Arc::new(Dispatcher::new(
        config.dispatcher_config(slack.bot_user_id()),
        history,
        ConcurrencyGate::new(config.max_concurrency),
        backend,
        Arc::new(slack.reply_sink()),
    ));

    tracing::info!(
        bot_user = %slack.bot_user_id(),
        allowed_channels = ?config.allowed_channels,
        mention_only = config.mention_only,
        max_concurrency = config.max_concurrency,
        codex_cd = %config.codex_cd.display(),
        "Bridge ready"
    );

    let (tx, mut rx) = mpsc::channel(256);
    let listener = slack.listen(tx);

    tokio::select! {
        _ = async {
            while let Some(event) = rx.recv().await {
                dispatcher.dispatch(event);
            }
        } => {
            tracing::warn!("Event stream closed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    listener.abort();
    tracing::info!("Shutting down");
    Ok(())
}
