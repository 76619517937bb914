use std::sync::Arc;

use anyhow::Result;
use binance_futures::TradingBroker;
use database::Store;
use llm_client::LlmProviders;
use market_data::MarketDataService;
use orchestrator::{Controller, RoleProviders, RuntimeConfig, SystemConfig};
use teloxide::prelude::*;
use tokio::signal::unix::SignalKind;

mod config;

use config::{load_env_file, AgentConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    load_env_file();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("Starting CoinSentinel monitoring agent");

    // 2. Load configuration (the only fatal failure point)
    let config = AgentConfig::from_env()?;
    let runtime = Arc::new(RuntimeConfig::load(&config.dynamic_config_path));
    tracing::info!(
        "Configuration loaded: {} primary symbols, heartbeat {}s",
        runtime.primary_symbols().len(),
        runtime.normal_interval()
    );

    // 3. Storage
    let store = Store::connect(&config.database_url).await?;
    tracing::info!("Database ready ({})", config.database_url);

    // 4. External clients
    let market_data = Arc::new(MarketDataService::new());
    let providers = LlmProviders::from_env();
    let broker = Arc::new(TradingBroker::from_env());

    // 5. Controller + master brain
    let role_providers = RoleProviders::from_env();
    let brain_provider = role_providers.chief.clone();
    let controller = Controller::new(
        SystemConfig::default(),
        runtime,
        store,
        market_data,
        broker,
        providers,
        role_providers,
    );
    Controller::init_brain(&controller, &brain_provider);

    // 6. Telegram wiring: push channel registered on the controller, the
    // dispatcher runs as its own task.
    let bot = Bot::new(&config.telegram_token);
    let notify_chat = ChatId(config.telegram_chat_id);
    controller.set_chat_transport(Arc::new(telegram_bot::TelegramNotifier::new(
        bot.clone(),
        notify_chat,
    )));

    // 7. Start monitoring: immediate base analysis + daily schedule
    controller.start_monitoring();

    let bot_task = tokio::spawn(telegram_bot::run_bot(
        bot,
        Arc::clone(&controller),
        notify_chat,
    ));
    tracing::info!("Telegram bot started, chat id {}", config.telegram_chat_id);

    // 8. Run until SIGINT/SIGTERM
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }

    tracing::info!("Shutdown signal received, exiting gracefully...");
    controller.shutdown();
    bot_task.abort();

    tracing::info!("Monitoring agent shut down.");
    Ok(())
}
