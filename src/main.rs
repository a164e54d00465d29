use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use trend_bot::config::load_config;
use trend_bot::connection::{BinanceMarketData, MarketDataGateway, OrderGateway, PaperOrderGateway};
use trend_bot::event_bus::{EventBus, DEFAULT_SIGNAL_BUFFER};
use trend_bot::logging::{init_tracing, EventLogger};
use trend_bot::tasks::TaskManager;
use trend_bot::utils::to_decimal;
use trend_bot::{CandleStore, PositionManager, ScanOrchestrator, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cfg = load_config()?;
    init_tracing(&cfg.logging);
    info!(
        higher = %cfg.trading.detector.higher_timeframe,
        lower = %cfg.trading.detector.lower_timeframe,
        max_positions = cfg.trading.max_positions,
        paper = cfg.paper.enabled,
        "MAIN: starting trend bot"
    );

    if !cfg.paper.enabled {
        bail!("paper.enabled is false but no live order gateway is bundled; plug a signed OrderGateway in to trade live");
    }

    let market: Arc<dyn MarketDataGateway> = Arc::new(BinanceMarketData::new(&cfg.binance, &cfg.scan)?);
    let orders: Arc<dyn OrderGateway> = Arc::new(PaperOrderGateway::new(
        market.clone(),
        to_decimal(cfg.paper.starting_balance),
    ));

    let (logger, log_handle) = EventLogger::to_file(&cfg.logging.event_log_file)?;
    let state = SharedState::new(cfg.auto_trade);
    let store = CandleStore::new(cfg.scan.candle_limit);
    let (scan_ch, position_ch) = EventBus::new(DEFAULT_SIGNAL_BUFFER);
    let shutdown = Arc::new(AtomicBool::new(false));

    let orchestrator = ScanOrchestrator::new(
        cfg.trading.clone(),
        cfg.scan.clone(),
        market.clone(),
        store.clone(),
        state.clone(),
        scan_ch,
        logger.clone(),
    );
    let manager = PositionManager::new(
        cfg.trading.clone(),
        orders,
        market,
        store,
        state.clone(),
        logger,
    );

    let mut tasks = TaskManager::new();
    tasks.spawn("scan_loop", orchestrator.run(shutdown.clone()));
    tasks.spawn("position_loop", manager.run(position_ch, shutdown.clone()));
    tasks.add_task("event_log", log_handle);
    tasks.spawn_health_check(shutdown.clone(), Duration::from_secs(30));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("MAIN: ctrl-c received, stopping"),
        Err(e) => error!(error = %e, "MAIN: failed to listen for ctrl-c, stopping"),
    }

    state.set_auto_trade(false);
    shutdown.store(true, Ordering::SeqCst);

    let open = state.positions().await;
    if !open.is_empty() {
        warn!(count = open.len(), "MAIN: positions left open on shutdown");
        for p in open {
            warn!(symbol = %p.symbol, direction = %p.direction, qty = %p.quantity, entry = %p.entry_price, "MAIN: open position");
        }
    }

    tasks.shutdown(Duration::from_secs(5)).await;
    info!("MAIN: stopped");
    Ok(())
}
