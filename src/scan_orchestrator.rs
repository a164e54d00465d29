// SCAN_ORCHESTRATOR: timer-driven scan cycles
// Pool refresh -> batch select -> sequential per-symbol fetch + detect -> signal channel
// A failing symbol is logged and skipped, never aborts the batch
// Trend series of open positions are refreshed every cycle, caps or not

use crate::candle_store::CandleStore;
use crate::config::{ScanConfig, TradingConfig};
use crate::connection::MarketDataGateway;
use crate::event_bus::ScanChannels;
use crate::logging::{EventLogger, LogEvent};
use crate::risk_manager::{check_limits, EntryLimits};
use crate::state::SharedState;
use crate::symbol_scanner::SymbolScanner;
use crate::trending::SignalDetector;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSummary {
    pub batch_index: usize,
    pub batch_count: usize,
    /// Symbols whose candles were fetched and evaluated
    pub checked: usize,
    /// Symbols skipped by caps or cooldown before fetching
    pub skipped: usize,
    pub signals: usize,
    /// Fetch failures
    pub errors: usize,
    /// Open-position symbols whose trend series was refreshed outside the batch
    pub held_refreshed: usize,
    pub pool_changed: bool,
    /// Auto trading was off at the start or got switched off mid-batch
    pub stopped: bool,
    /// Symbols scanned, in order
    pub symbols: Vec<String>,
}

pub struct ScanOrchestrator {
    market: Arc<dyn MarketDataGateway>,
    scanner: SymbolScanner,
    detector: SignalDetector,
    store: CandleStore,
    state: SharedState,
    channels: ScanChannels,
    logger: EventLogger,
    trading: TradingConfig,
    scan: ScanConfig,
    limits: EntryLimits,
}

impl ScanOrchestrator {
    pub fn new(
        trading: TradingConfig,
        scan: ScanConfig,
        market: Arc<dyn MarketDataGateway>,
        store: CandleStore,
        state: SharedState,
        channels: ScanChannels,
        logger: EventLogger,
    ) -> Self {
        Self {
            scanner: SymbolScanner::new(market.clone(), scan.clone()),
            detector: SignalDetector::new(trading.detector.clone()),
            limits: EntryLimits::from_config(&trading),
            market,
            store,
            state,
            channels,
            logger,
            trading,
            scan,
        }
    }

    pub fn scanner(&self) -> &SymbolScanner {
        &self.scanner
    }

    /// Run one scan cycle at `now`.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleSummary> {
        let mut summary = CycleSummary::default();
        if !self.state.auto_trade_enabled() {
            summary.stopped = true;
            self.refresh_held_trends(&mut summary).await;
            return Ok(summary);
        }

        summary.pool_changed = self
            .scanner
            .refresh_if_due(now)
            .await
            .context("pool refresh failed")?;
        if summary.pool_changed {
            let mut keep = self.scanner.state().pool().to_vec();
            keep.extend(self.held_symbols().await);
            self.store.retain_symbols(&keep).await;
        }

        let (batch_index, batch) = match self.scanner.next_batch() {
            Some(b) => b,
            None => {
                warn!("SCANNER: symbol pool is empty");
                self.refresh_held_trends(&mut summary).await;
                return Ok(summary);
            }
        };
        summary.batch_index = batch_index;
        summary.batch_count = self.scanner.batch_count();

        let delay = Duration::from_millis(self.scan.symbol_delay_ms);
        for (i, symbol) in batch.iter().enumerate() {
            if !self.state.auto_trade_enabled() {
                info!("SCANNER: auto trading stopped, abandoning batch");
                summary.stopped = true;
                break;
            }

            let open = self.state.open_count().await;
            let ledger = self.state.ledger().await;
            if let Err(reason) = check_limits(symbol, open, &ledger, &self.limits, now) {
                debug!(symbol = %symbol, reason = %reason, "SCANNER: skipped");
                summary.skipped += 1;
                continue;
            }

            match self.scan_symbol(symbol, now).await {
                Ok(found) => {
                    summary.checked += 1;
                    summary.symbols.push(symbol.clone());
                    if found {
                        summary.signals += 1;
                    }
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "SCANNER: symbol scan failed");
                    summary.errors += 1;
                }
            }

            if i + 1 < batch.len() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        self.refresh_held_trends(&mut summary).await;

        info!(
            batch = summary.batch_index + 1,
            batches = summary.batch_count,
            checked = summary.checked,
            skipped = summary.skipped,
            signals = summary.signals,
            errors = summary.errors,
            held_refreshed = summary.held_refreshed,
            "SCANNER: cycle done"
        );
        self.logger.log(LogEvent::ScanSummary {
            timestamp: EventLogger::timestamp(),
            batch_index: summary.batch_index,
            batch_count: summary.batch_count,
            checked: summary.checked,
            skipped: summary.skipped,
            signals: summary.signals,
            errors: summary.errors,
        });
        Ok(summary)
    }

    async fn held_symbols(&self) -> Vec<String> {
        self.state.positions().await.into_iter().map(|p| p.symbol).collect()
    }

    /// Keep the higher-timeframe series of every open position current.
    ///
    /// Runs every cycle regardless of caps and batch, also while auto trading is off.
    /// Symbols scanned this cycle are already fresh.
    async fn refresh_held_trends(&self, summary: &mut CycleSummary) {
        let timeframe = self.detector.config().higher_timeframe;
        for symbol in self.held_symbols().await {
            if summary.symbols.contains(&symbol) {
                continue;
            }
            match self.market.get_candles(&symbol, timeframe, self.scan.candle_limit).await {
                Ok(candles) => {
                    self.store.merge(&symbol, timeframe, &candles).await;
                    summary.held_refreshed += 1;
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "SCANNER: open position trend refresh failed");
                    summary.errors += 1;
                }
            }
        }
    }

    /// Fetch both timeframes, update the store, detect. `Ok(true)` when a signal was forwarded.
    async fn scan_symbol(&self, symbol: &str, now: DateTime<Utc>) -> Result<bool> {
        let cfg = self.detector.config();
        let limit = self.scan.candle_limit;
        let (higher, lower) = tokio::join!(
            self.market.get_candles(symbol, cfg.higher_timeframe, limit),
            self.market.get_candles(symbol, cfg.lower_timeframe, limit),
        );
        let higher = higher.with_context(|| format!("{} candles", cfg.higher_timeframe))?;
        let lower = lower.with_context(|| format!("{} candles", cfg.lower_timeframe))?;

        let higher = self.store.merge(symbol, cfg.higher_timeframe, &higher).await;
        let lower = self.store.merge(symbol, cfg.lower_timeframe, &lower).await;

        match self.detector.detect(symbol, &higher, &lower, now) {
            Ok(signal) => {
                info!(
                    symbol = %symbol,
                    direction = %signal.direction,
                    confidence = signal.confidence,
                    "SCANNER: signal accepted: {}",
                    signal.reason
                );
                self.logger.log(LogEvent::SignalAccepted {
                    timestamp: EventLogger::timestamp(),
                    symbol: symbol.to_string(),
                    direction: signal.direction.to_string(),
                    entry_price: signal.entry_price,
                    confidence: signal.confidence,
                    reason: signal.reason.clone(),
                });
                if !self.state.auto_trade_enabled() {
                    return Ok(false);
                }
                self.channels
                    .signal_tx
                    .send(signal)
                    .await
                    .context("position manager is gone")?;
                Ok(true)
            }
            Err(rejection) => {
                debug!(symbol = %symbol, "SCANNER: rejected: {}", rejection);
                self.logger.log(LogEvent::SignalRejected {
                    timestamp: EventLogger::timestamp(),
                    symbol: symbol.to_string(),
                    kind: rejection.kind().to_string(),
                    reason: rejection.to_string(),
                });
                Ok(false)
            }
        }
    }

    /// Scan every `scan_interval_secs` until `shutdown` is set.
    pub async fn run(mut self, shutdown: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.trading.scan_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.trading.scan_interval_secs,
            batch_size = self.scan.batch_size,
            "SCANNER: scan loop started"
        );

        loop {
            ticker.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            if let Err(e) = self.run_cycle(Utc::now()).await {
                warn!(error = %e, "SCANNER: cycle failed");
            }
        }
        info!("SCANNER: scan loop stopped");
    }
}
