// src/main.rs
use anyhow::{Context, Result};
use chrono::Utc;
use dotenvy::dotenv;
use spot_forecaster::config::{AppConfig, PredictorKind};
use spot_forecaster::connectors::binance::BinanceClient;
use spot_forecaster::connectors::telegram::TelegramNotifier;
use spot_forecaster::connectors::traits::{ExchangeClient, MarketDataSource};
use spot_forecaster::core::decision::{DecisionEngine, DecisionParams};
use spot_forecaster::core::engine::{Cadence, TradingEngine};
use spot_forecaster::core::lifecycle::{OrderManager, OrderParams};
use spot_forecaster::core::notifier::spawn_notifier;
use spot_forecaster::predictors::ema_trend::EmaTrendPredictor;
use spot_forecaster::predictors::model_service::ModelServicePredictor;
use spot_forecaster::predictors::traits::PricePredictor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(log_dir: &str) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "spot_forecaster.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    guard
}

fn build_predictor(
    cfg: &AppConfig,
    market: Arc<dyn MarketDataSource>,
) -> Result<Arc<dyn PricePredictor>> {
    let p = &cfg.predictor;
    Ok(match p.kind {
        PredictorKind::ModelService => {
            let url = p
                .model_url
                .as_deref()
                .context("predictor.model_url is not set")?;
            Arc::new(ModelServicePredictor::new(
                market,
                url,
                cfg.symbol.clone(),
                p.interval.clone(),
                p.history,
                p.window,
            )?)
        }
        PredictorKind::EmaTrend => Arc::new(EmaTrendPredictor::new(
            market,
            cfg.symbol.clone(),
            p.interval.clone(),
            p.history,
            p.ema_period,
        )),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // 1. Load Configuration
    let cfg = AppConfig::new().context("Invalid configuration")?;
    let _log_guard = init_logging(&cfg.log_dir);

    info!("========================================");
    info!("       SPOT FORECASTER - v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!(
        "Target: {} | Order value: {} {} | Profit: {} | Min impact: {}",
        cfg.symbol, cfg.min_order_value, cfg.quote_asset, cfg.profit_percent, cfg.available_price_impact
    );

    // 2. Initialize Components
    let binance = Arc::new(BinanceClient::new(
        cfg.binance_api_key.clone(),
        cfg.binance_key_secret.clone(),
        &cfg.binance_base_url,
    )?);

    // Биржа недоступна на старте - фатально
    let server_time = binance
        .server_time()
        .await
        .context("Exchange unreachable at startup")?;
    let skew = Utc::now().timestamp_millis() - server_time;
    info!("Exchange server time {} (local skew {} ms)", server_time, skew);
    if skew.abs() > 1000 {
        warn!("Local clock is {} ms off the exchange, signed requests may be rejected", skew);
    }

    let predictor = build_predictor(&cfg, binance.clone())?;
    info!(
        "Predictor: {} (offset {})",
        predictor.name(),
        cfg.calibration_offset()
    );

    let sink = Arc::new(TelegramNotifier::new(
        &cfg.tg_token,
        cfg.tg_chat_id.clone(),
        &cfg.telegram_base_url,
    )?);
    let (notify_tx, notifier) = spawn_notifier(sink, cfg.timing.notify_timeout(), 64);

    let decision = DecisionEngine::new(
        predictor,
        binance.clone(),
        binance.clone(),
        DecisionParams {
            quote_asset: cfg.quote_asset.clone(),
            quote_interval: cfg.quote_interval.clone(),
            min_order_value: cfg.min_order_value,
            available_price_impact: cfg.available_price_impact,
            prediction_offset: cfg.calibration_offset(),
            exchange_timeout: cfg.timing.exchange_timeout(),
            prediction_timeout: cfg.timing.prediction_timeout(),
        },
    );

    let orders = OrderManager::new(
        binance,
        OrderParams {
            quote_asset: cfg.quote_asset.clone(),
            profit_percent: cfg.profit_percent,
            fees_percent: cfg.fees_percent,
            fee_adjusted_exit: cfg.fee_adjusted_exit,
            quantity_precision: cfg.precision.quantity,
            price_precision: cfg.precision.price,
            settle_delay: cfg.timing.settle_delay(),
            exchange_timeout: cfg.timing.exchange_timeout(),
        },
    );

    let mut engine = TradingEngine::new(
        cfg.symbol.clone(),
        decision,
        orders,
        notify_tx,
        Cadence {
            base_delay: cfg.timing.base_delay(),
            traded_cooldown: cfg.timing.traded_cooldown(),
            insufficient_funds_backoff: cfg.timing.insufficient_funds_backoff(),
        },
    );

    // 3. Run until Ctrl+C
    tokio::select! {
        _ = engine.run() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl+C received, stopping. Resting orders stay on the exchange.");
        }
    }

    // Дать уйти уже поставленным уведомлениям
    drop(engine);
    if tokio::time::timeout(Duration::from_secs(5), notifier).await.is_err() {
        warn!("Pending notifications not delivered before exit");
    }

    Ok(())
}
