use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use teloxide::Bot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, Notifier, RegistryStore, WINDOW_CAPACITY};
use engine::{CryptoFetcher, Evaluator, Fetcher, FetcherRegistry, Refresher, StockFetcher, WindowStore};
use store::SqliteStore;
use strategy::{StrategyFileConfig, StrategyOptions, StrategyRegistry};
use telegram_ctrl::{start_bot, TelegramNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(port = cfg.api_port, "SignalBot starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let sqlite = SqliteStore::connect(&cfg.database_url)
        .await
        .context("connect to database")?;
    sqlite.migrate().await.context("run migrations")?;
    let store: Arc<dyn RegistryStore> = Arc::new(sqlite);
    info!("Database ready");

    // ── Fetchers ──────────────────────────────────────────────────────────────
    let stock = StockFetcher::new(&cfg.rapid_api, cfg.timeouts.fetch).context("build stock fetcher")?;
    let crypto = CryptoFetcher::new(
        &cfg.token_insight,
        &cfg.coin_api,
        cfg.crypto_shorthands.clone(),
        cfg.timeouts.fetch,
    )
    .context("build crypto fetcher")?;
    let fetchers: Vec<Arc<dyn Fetcher>> = vec![Arc::new(stock), Arc::new(crypto)];
    let fetchers = Arc::new(FetcherRegistry::new(fetchers));

    // ── Strategies ────────────────────────────────────────────────────────────
    let opts = StrategyOptions {
        fng_api_url: cfg.fng_api_url.clone(),
        sentiment_timeout: cfg.timeouts.sentiment,
    };
    let strategies = if Path::new(&cfg.strategy_config_path).exists() {
        let file = StrategyFileConfig::load(&cfg.strategy_config_path)?;
        StrategyRegistry::from_config(&file, &opts)?
    } else {
        warn!(path = %cfg.strategy_config_path, "Strategy config not found, using built-in set");
        StrategyRegistry::builtin(&opts)?
    };
    let strategies = Arc::new(strategies);
    info!(strategies = ?strategies.names(), "Strategies loaded");

    // ── Pipeline ──────────────────────────────────────────────────────────────
    let window = Arc::new(WindowStore::new(store.clone(), WINDOW_CAPACITY, cfg.timeouts));
    let refresher = Refresher::new(store.clone(), fetchers, window.clone(), cfg.timeouts);
    let evaluator = Evaluator::new(store.clone(), strategies.clone(), window, cfg.timeouts);

    // ── Telegram ──────────────────────────────────────────────────────────────
    let bot = Bot::new(cfg.telegram_token.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone()));
    tokio::spawn(start_bot(bot));

    // ── HTTP API ──────────────────────────────────────────────────────────────
    let state = api::AppState {
        store,
        refresher,
        evaluator,
        strategies,
        notifier,
        chat_id: cfg.telegram_chat_id,
        timeouts: cfg.timeouts,
    };

    tokio::select! {
        res = api::serve(state, cfg.api_port) => res.context("http server")?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received. Exiting."),
    }
    Ok(())
}
