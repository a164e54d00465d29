use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;
use trend_bot::config::{load_config, AppCfg};
use trend_bot::connection::rest::{BinanceMarketData, MAX_KLINES_PER_REQUEST};
use trend_bot::trending::{replay_signals, SignalDetector};

/// Replays the signal detector bar by bar over recent Binance history.
///
/// Signals only, no PnL. Uses `config.yaml` (or `--config <path>`) when present.
///
/// ```bash
/// SYMBOL=ETHUSDT LIMIT=1000 cargo run --bin signal_replay
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let symbol = std::env::var("SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string());
    let limit: usize = std::env::var("LIMIT")
        .unwrap_or_else(|_| "1000".to_string())
        .parse()
        .unwrap_or(1000);
    let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST);

    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config not loaded ({}), using defaults", e);
            AppCfg::default()
        }
    };
    let detector_cfg = cfg.trading.detector.clone();
    let window = cfg.scan.candle_limit;

    // Enough higher-timeframe history to cover the lower range plus one full window
    let ratio = (detector_cfg.higher_timeframe.duration().num_seconds()
        / detector_cfg.lower_timeframe.duration().num_seconds().max(1))
    .max(1) as usize;
    let higher_limit = (limit / ratio + window).min(MAX_KLINES_PER_REQUEST);

    println!("===== SIGNAL REPLAY =====");
    println!("Symbol      : {}", symbol);
    println!(
        "Timeframes  : {} trend / {} entry",
        detector_cfg.higher_timeframe, detector_cfg.lower_timeframe
    );
    println!("Entry bars  : {} (window {})", limit, window);
    println!("Started     : {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    let market = BinanceMarketData::new(&cfg.binance, &cfg.scan)?;
    let (higher, lower) = tokio::join!(
        market.fetch_klines(&symbol, detector_cfg.higher_timeframe, higher_limit, None),
        market.fetch_klines(&symbol, detector_cfg.lower_timeframe, limit, None),
    );
    let (higher, lower) = (higher?, lower?);

    let detector = SignalDetector::new(detector_cfg);
    let report = replay_signals(&detector, &symbol, &higher, &lower, window);

    for signal in &report.signals {
        println!(
            "{}  {:<5}  entry {:>14.6}  confidence {:.2}  {}",
            signal.time.format("%Y-%m-%d %H:%M"),
            signal.direction.to_string(),
            signal.entry_price,
            signal.confidence,
            signal.reason
        );
    }

    println!();
    println!("===== REPLAY RESULTS: {} =====", symbol);
    println!("Bars evaluated : {}", report.bars);
    println!("Signals        : {}", report.signals.len());
    let longs = report
        .signals
        .iter()
        .filter(|s| s.direction == trend_bot::types::PositionDirection::Long)
        .count();
    println!("  long / short : {} / {}", longs, report.signals.len() - longs);
    for (kind, count) in &report.rejections {
        println!("Rejected {:<14}: {}", kind, count);
    }

    Ok(())
}
