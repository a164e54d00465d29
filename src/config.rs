// Configuration structures and loading logic
// One YAML file, every field optional with a default function

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::types::Timeframe;

// ============================================================================
// Configuration Structures
// ============================================================================

/// Signal detector parameters (trend stage + entry filters).
#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// Trend timeframe
    #[serde(default = "default_higher_timeframe")]
    pub higher_timeframe: Timeframe,
    /// Entry timeframe
    #[serde(default = "default_lower_timeframe")]
    pub lower_timeframe: Timeframe,
    #[serde(default = "default_ema_short")]
    pub ema_short: usize,
    #[serde(default = "default_ema_long")]
    pub ema_long: usize,
    #[serde(default = "default_volume_ma_period")]
    pub volume_ma_period: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    /// Minimum |emaShort - emaLong| / emaLong in percent (0.15 = 0.15%)
    #[serde(default = "default_min_trend_distance_pct")]
    pub min_trend_distance_pct: f64,

    /// Filter (a): close beyond the short EMA on the trend side
    #[serde(default = "default_true")]
    pub price_position_filter: bool,
    /// Filter (b): RSI on the trend side of the threshold and moving with the trend
    #[serde(default = "default_true")]
    pub rsi_filter: bool,
    /// Filter (c): wick touched the short EMA within `ema_touch_lookback` bars
    #[serde(default = "default_true")]
    pub ema_touch_filter: bool,
    /// Filter (d): candle colour and body size agree with the trend
    #[serde(default = "default_true")]
    pub candle_filter: bool,

    /// Long needs RSI >= threshold, short needs RSI <= 100 - threshold
    #[serde(default = "default_rsi_threshold")]
    pub rsi_threshold: f64,
    #[serde(default = "default_ema_touch_lookback")]
    pub ema_touch_lookback: usize,
    /// Minimum candle body in percent of open
    #[serde(default = "default_min_body_pct")]
    pub min_body_pct: f64,
}

/// Sizing, caps and exit management. Handed to each cycle by value.
#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    /// Percentage of available balance used as margin per trade
    #[serde(default = "default_position_size_pct")]
    pub position_size_pct: f64,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    /// Entries per UTC day
    #[serde(default = "default_daily_trade_limit")]
    pub daily_trade_limit: u32,
    /// Initial stop distance in percent of entry; also defines R
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    /// Simple take-profit target, only used when partial TP is disabled
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,

    #[serde(default = "default_true")]
    pub partial_tp_enabled: bool,
    #[serde(default = "default_partial_tp_r1")]
    pub partial_tp_r1: f64,
    /// Share of the open quantity closed at R1 (0.5 = half)
    #[serde(default = "default_partial_tp_r1_fraction")]
    pub partial_tp_r1_fraction: f64,
    #[serde(default = "default_partial_tp_r2")]
    pub partial_tp_r2: f64,
    #[serde(default = "default_partial_tp_r3")]
    pub partial_tp_r3: f64,

    #[serde(default)]
    pub trailing_stop_enabled: bool,
    /// Trailing activates at this many R in favour and trails by the same distance
    #[serde(default = "default_trailing_stop_trigger_r")]
    pub trailing_stop_trigger_r: f64,
    /// Clamp the trailing stop so it is never worse than entry
    #[serde(default = "default_true")]
    pub trailing_stop_move_to_breakeven: bool,
    /// Move the static stop to entry once the R1 partial fills
    #[serde(default = "default_true")]
    pub breakeven_enabled: bool,
    #[serde(default = "default_true")]
    pub reverse_signal_close: bool,

    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Per-symbol pause after a trade
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    #[serde(default)]
    pub detector: DetectorConfig,
}

/// Symbol pool and batch rotation.
#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// Top-K symbols kept from the liquidity ranking
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_pool_refresh_minutes")]
    pub pool_refresh_minutes: u64,
    /// Pause between symbols inside one batch
    #[serde(default = "default_symbol_delay_ms")]
    pub symbol_delay_ms: u64,
    /// Candles requested per timeframe (also the store capacity)
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    /// 24h quote volume floor for the ranking
    #[serde(default = "default_min_quote_volume")]
    pub min_quote_volume: f64,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    #[serde(default)]
    pub excluded_symbols: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingCfg {
    /// Used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// JSON formatted tracing output
    #[serde(default)]
    pub json: bool,
    /// JSON-lines file receiving structured trading events
    #[serde(default = "default_event_log_file")]
    pub event_log_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BinanceCfg {
    #[serde(default = "default_futures_base")]
    pub futures_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaperCfg {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_paper_balance")]
    pub starting_balance: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppCfg {
    /// Global auto-trade switch; when off no scan runs and no entry is placed
    #[serde(default = "default_true")]
    pub auto_trade: bool,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub logging: LoggingCfg,
    #[serde(default)]
    pub binance: BinanceCfg,
    #[serde(default)]
    pub paper: PaperCfg,
}

// ============================================================================
// Default Value Functions
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_higher_timeframe() -> Timeframe {
    Timeframe::M15
}

fn default_lower_timeframe() -> Timeframe {
    Timeframe::M5
}

fn default_ema_short() -> usize {
    20
}

fn default_ema_long() -> usize {
    60
}

fn default_volume_ma_period() -> usize {
    20
}

fn default_rsi_period() -> usize {
    14
}

fn default_min_trend_distance_pct() -> f64 {
    0.15
}

fn default_rsi_threshold() -> f64 {
    50.0
}

fn default_ema_touch_lookback() -> usize {
    5
}

fn default_min_body_pct() -> f64 {
    0.05
}

fn default_position_size_pct() -> f64 {
    10.0
}

fn default_leverage() -> u32 {
    10
}

fn default_max_positions() -> usize {
    3
}

fn default_daily_trade_limit() -> u32 {
    10
}

fn default_stop_loss_pct() -> f64 {
    0.5
}

fn default_take_profit_pct() -> f64 {
    1.0
}

fn default_partial_tp_r1() -> f64 {
    1.0
}

fn default_partial_tp_r1_fraction() -> f64 {
    0.5
}

fn default_partial_tp_r2() -> f64 {
    2.0
}

fn default_partial_tp_r3() -> f64 {
    3.0
}

fn default_trailing_stop_trigger_r() -> f64 {
    1.0
}

fn default_scan_interval_secs() -> u64 {
    60
}

fn default_refresh_interval_secs() -> u64 {
    5
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_pool_size() -> usize {
    50
}

fn default_batch_size() -> usize {
    10
}

fn default_pool_refresh_minutes() -> u64 {
    30
}

fn default_symbol_delay_ms() -> u64 {
    250
}

fn default_candle_limit() -> usize {
    200
}

fn default_min_quote_volume() -> f64 {
    10_000_000.0
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_log_file() -> String {
    "logs/trading_events.jsonl".to_string()
}

fn default_futures_base() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_paper_balance() -> f64 {
    1000.0
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            higher_timeframe: default_higher_timeframe(),
            lower_timeframe: default_lower_timeframe(),
            ema_short: default_ema_short(),
            ema_long: default_ema_long(),
            volume_ma_period: default_volume_ma_period(),
            rsi_period: default_rsi_period(),
            min_trend_distance_pct: default_min_trend_distance_pct(),
            price_position_filter: true,
            rsi_filter: true,
            ema_touch_filter: true,
            candle_filter: true,
            rsi_threshold: default_rsi_threshold(),
            ema_touch_lookback: default_ema_touch_lookback(),
            min_body_pct: default_min_body_pct(),
        }
    }
}

impl DetectorConfig {
    /// Candles a timeframe needs before the detector will evaluate it.
    pub fn min_candles(&self) -> usize {
        self.ema_long.max(self.rsi_period) + 10
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            position_size_pct: default_position_size_pct(),
            leverage: default_leverage(),
            max_positions: default_max_positions(),
            daily_trade_limit: default_daily_trade_limit(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            partial_tp_enabled: true,
            partial_tp_r1: default_partial_tp_r1(),
            partial_tp_r1_fraction: default_partial_tp_r1_fraction(),
            partial_tp_r2: default_partial_tp_r2(),
            partial_tp_r3: default_partial_tp_r3(),
            trailing_stop_enabled: false,
            trailing_stop_trigger_r: default_trailing_stop_trigger_r(),
            trailing_stop_move_to_breakeven: true,
            breakeven_enabled: true,
            reverse_signal_close: true,
            scan_interval_secs: default_scan_interval_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            cooldown_secs: default_cooldown_secs(),
            detector: DetectorConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            batch_size: default_batch_size(),
            pool_refresh_minutes: default_pool_refresh_minutes(),
            symbol_delay_ms: default_symbol_delay_ms(),
            candle_limit: default_candle_limit(),
            min_quote_volume: default_min_quote_volume(),
            quote_asset: default_quote_asset(),
            excluded_symbols: Vec::new(),
        }
    }
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            event_log_file: default_event_log_file(),
        }
    }
}

impl Default for BinanceCfg {
    fn default() -> Self {
        Self {
            futures_base: default_futures_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PaperCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            starting_balance: default_paper_balance(),
        }
    }
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            auto_trade: true,
            trading: TradingConfig::default(),
            scan: ScanConfig::default(),
            logging: LoggingCfg::default(),
            binance: BinanceCfg::default(),
            paper: PaperCfg::default(),
        }
    }
}

// ============================================================================
// Loading & Validation
// ============================================================================

/// Path given with `--config <path>`, `./config.yaml` otherwise.
pub fn config_path_from_args() -> String {
    let args: Vec<String> = std::env::args().collect();
    args.windows(2)
        .find_map(|w| {
            if w[0] == "--config" {
                Some(w[1].clone())
            } else {
                None
            }
        })
        .unwrap_or_else(|| "./config.yaml".to_string())
}

pub fn load_config() -> Result<AppCfg> {
    let path = config_path_from_args();
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AppCfg> {
    let cfg: AppCfg = serde_yaml::from_str(content).context("failed to parse config yaml")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Validate configuration values
pub fn validate_config(cfg: &AppCfg) -> Result<()> {
    let t = &cfg.trading;
    let d = &t.detector;

    if d.ema_short == 0 || d.ema_long == 0 || d.rsi_period == 0 || d.volume_ma_period == 0 {
        return Err(anyhow!("detector periods must be positive"));
    }
    if d.ema_short >= d.ema_long {
        return Err(anyhow!(
            "detector.ema_short ({}) must be smaller than detector.ema_long ({})",
            d.ema_short,
            d.ema_long
        ));
    }
    if d.higher_timeframe.duration() <= d.lower_timeframe.duration() {
        return Err(anyhow!(
            "detector.higher_timeframe ({}) must be longer than detector.lower_timeframe ({})",
            d.higher_timeframe,
            d.lower_timeframe
        ));
    }
    if d.min_trend_distance_pct < 0.0 {
        return Err(anyhow!("detector.min_trend_distance_pct must not be negative"));
    }
    if !(0.0..=100.0).contains(&d.rsi_threshold) {
        return Err(anyhow!("detector.rsi_threshold must be within [0, 100]"));
    }
    if d.ema_touch_lookback == 0 {
        return Err(anyhow!("detector.ema_touch_lookback must be at least 1"));
    }
    if d.min_body_pct < 0.0 {
        return Err(anyhow!("detector.min_body_pct must not be negative"));
    }

    if t.position_size_pct <= 0.0 || t.position_size_pct > 100.0 {
        return Err(anyhow!("trading.position_size_pct must be within (0, 100]"));
    }
    if t.leverage == 0 {
        return Err(anyhow!("trading.leverage must be at least 1"));
    }
    if t.max_positions == 0 {
        return Err(anyhow!("trading.max_positions must be at least 1"));
    }
    if t.stop_loss_pct <= 0.0 {
        return Err(anyhow!("trading.stop_loss_pct must be positive"));
    }
    if t.take_profit_pct <= 0.0 {
        return Err(anyhow!("trading.take_profit_pct must be positive"));
    }
    if t.partial_tp_enabled {
        if !(t.partial_tp_r1 > 0.0 && t.partial_tp_r1 < t.partial_tp_r2 && t.partial_tp_r2 < t.partial_tp_r3) {
            return Err(anyhow!(
                "partial take-profit tiers must satisfy 0 < r1 < r2 < r3 (got {} / {} / {})",
                t.partial_tp_r1,
                t.partial_tp_r2,
                t.partial_tp_r3
            ));
        }
        if t.partial_tp_r1_fraction <= 0.0 || t.partial_tp_r1_fraction >= 1.0 {
            return Err(anyhow!("trading.partial_tp_r1_fraction must be within (0, 1)"));
        }
    }
    if t.trailing_stop_enabled && t.trailing_stop_trigger_r <= 0.0 {
        return Err(anyhow!("trading.trailing_stop_trigger_r must be positive"));
    }
    if t.scan_interval_secs == 0 || t.refresh_interval_secs == 0 {
        return Err(anyhow!("scan and refresh intervals must be positive"));
    }

    let s = &cfg.scan;
    if s.pool_size == 0 || s.batch_size == 0 {
        return Err(anyhow!("scan.pool_size and scan.batch_size must be positive"));
    }
    if s.candle_limit < d.min_candles() {
        return Err(anyhow!(
            "scan.candle_limit ({}) is below the {} candles the detector needs",
            s.candle_limit,
            d.min_candles()
        ));
    }
    let quote_upper = s.quote_asset.to_uppercase();
    if quote_upper != "USDC" && quote_upper != "USDT" {
        return Err(anyhow!(
            "scan.quote_asset must be either 'USDC' or 'USDT', got '{}'",
            s.quote_asset
        ));
    }

    if cfg.paper.enabled && cfg.paper.starting_balance <= 0.0 {
        return Err(anyhow!("paper.starting_balance must be positive"));
    }

    // Overlapping exit strategies are legal; the fixed risk order decides which one acts.
    if t.partial_tp_enabled && t.trailing_stop_enabled {
        warn!(
            "CONFIG: partial take-profit and trailing stop both enabled; the ladder is checked first each tick"
        );
    }
    if !d.price_position_filter && !d.rsi_filter && !d.ema_touch_filter && !d.candle_filter {
        warn!("CONFIG: all entry filters disabled; every confirmed trend will produce a signal");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let cfg = parse_config("{}").unwrap();
        assert!(cfg.auto_trade);
        assert_eq!(cfg.trading.detector.ema_short, 20);
        assert_eq!(cfg.trading.detector.ema_long, 60);
        assert_eq!(cfg.trading.detector.higher_timeframe, Timeframe::M15);
        assert_eq!(cfg.trading.detector.lower_timeframe, Timeframe::M5);
        assert_eq!(cfg.trading.cooldown_secs, 300);
        assert_eq!(cfg.scan.batch_size, 10);
        assert_eq!(cfg.trading.detector.min_candles(), 70);
    }

    #[test]
    fn nested_sections_override_defaults() {
        let yaml = r#"
trading:
  stop_loss_pct: 0.8
  trailing_stop_enabled: true
  detector:
    higher_timeframe: 1h
    rsi_threshold: 55
scan:
  batch_size: 5
  excluded_symbols: [USDCUSDT]
"#;
        let cfg = parse_config(yaml).unwrap();
        assert_eq!(cfg.trading.stop_loss_pct, 0.8);
        assert!(cfg.trading.trailing_stop_enabled);
        assert_eq!(cfg.trading.detector.higher_timeframe, Timeframe::H1);
        assert_eq!(cfg.trading.detector.rsi_threshold, 55.0);
        assert_eq!(cfg.trading.detector.ema_long, 60);
        assert_eq!(cfg.scan.batch_size, 5);
        assert_eq!(cfg.scan.excluded_symbols, vec!["USDCUSDT".to_string()]);
    }

    #[test]
    fn rejects_inverted_emas() {
        let mut cfg = AppCfg::default();
        cfg.trading.detector.ema_short = 60;
        cfg.trading.detector.ema_long = 20;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_unordered_tp_tiers() {
        let mut cfg = AppCfg::default();
        cfg.trading.partial_tp_r2 = 0.5;
        assert!(validate_config(&cfg).is_err());

        cfg.trading.partial_tp_enabled = false;
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_timeframes_in_wrong_order() {
        let mut cfg = AppCfg::default();
        cfg.trading.detector.higher_timeframe = Timeframe::M5;
        cfg.trading.detector.lower_timeframe = Timeframe::M15;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_candle_limit_below_detector_minimum() {
        let mut cfg = AppCfg::default();
        cfg.scan.candle_limit = 50;
        assert!(validate_config(&cfg).is_err());
    }
}
