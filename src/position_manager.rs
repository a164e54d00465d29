// POSITION_MANAGER: single writer of open positions
// Opens positions from signals, runs the risk ladder on every refresh tick,
// and applies only confirmed fills

use crate::candle_store::CandleStore;
use crate::config::TradingConfig;
use crate::connection::{MarketDataGateway, OrderGateway};
use crate::event_bus::PositionChannels;
use crate::logging::{EventLogger, LogEvent};
use crate::ordering::{self, IntentResult, OrderIntent};
use crate::risk::{self, FillOutcome, RiskAction, RiskParams};
use crate::risk_manager::{check_limits, position_quantity, EntryLimits, SkipReason};
use crate::state::SharedState;
use crate::trending::SignalDetector;
use crate::types::{Position, Signal, SymbolRules};
use crate::utils::{to_decimal, to_f64};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Opened(Position),
    Skipped(SkipReason),
    /// Gateway refused or nothing filled; nothing was recorded
    NotExecuted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Held,
    Reduced,
    Closed,
    /// Close was not executed; quantity untouched, retried next tick
    Failed(String),
    MarkUnavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub symbol: String,
    pub action: RiskAction,
    pub outcome: TickOutcome,
}

pub struct PositionManager {
    orders: Arc<dyn OrderGateway>,
    market: Arc<dyn MarketDataGateway>,
    store: CandleStore,
    detector: SignalDetector,
    state: SharedState,
    logger: EventLogger,
    trading: TradingConfig,
    params: RiskParams,
    limits: EntryLimits,
    rules: HashMap<String, SymbolRules>,
}

impl PositionManager {
    pub fn new(
        trading: TradingConfig,
        orders: Arc<dyn OrderGateway>,
        market: Arc<dyn MarketDataGateway>,
        store: CandleStore,
        state: SharedState,
        logger: EventLogger,
    ) -> Self {
        Self {
            params: RiskParams::from_config(&trading),
            limits: EntryLimits::from_config(&trading),
            detector: SignalDetector::new(trading.detector.clone()),
            trading,
            orders,
            market,
            store,
            state,
            logger,
            rules: HashMap::new(),
        }
    }

    async fn symbol_rules(&mut self, symbol: &str) -> anyhow::Result<SymbolRules> {
        if let Some(rules) = self.rules.get(symbol) {
            return Ok(rules.clone());
        }
        let rules = self.market.get_symbol_rules(symbol).await?;
        self.rules.insert(symbol.to_string(), rules.clone());
        Ok(rules)
    }

    fn skip(&self, signal: &Signal, reason: SkipReason) -> EntryOutcome {
        info!(symbol = %signal.symbol, reason = %reason, "POSITIONS: entry skipped");
        self.logger.log(LogEvent::EntrySkipped {
            timestamp: EventLogger::timestamp(),
            symbol: signal.symbol.clone(),
            kind: reason.kind().to_string(),
            reason: reason.to_string(),
        });
        EntryOutcome::Skipped(reason)
    }

    fn not_executed(&self, symbol: &str, intent: &str, error: String) -> EntryOutcome {
        self.logger.log(LogEvent::OrderFailed {
            timestamp: EventLogger::timestamp(),
            symbol: symbol.to_string(),
            intent: intent.to_string(),
            error: error.clone(),
        });
        EntryOutcome::NotExecuted(error)
    }

    /// Try to open a position for `signal`. Caps here are authoritative.
    pub async fn on_signal(&mut self, signal: &Signal) -> EntryOutcome {
        if !self.state.auto_trade_enabled() {
            return self.skip(signal, SkipReason::AutoTradeDisabled);
        }
        if self.state.has_position(&signal.symbol).await {
            return self.skip(signal, SkipReason::AlreadyOpen);
        }
        let open = self.state.open_count().await;
        let ledger = self.state.ledger().await;
        if let Err(reason) = check_limits(&signal.symbol, open, &ledger, &self.limits, signal.time) {
            return self.skip(signal, reason);
        }

        let rules = match self.symbol_rules(&signal.symbol).await {
            Ok(r) => r,
            Err(e) => return self.not_executed(&signal.symbol, "rules", e.to_string()),
        };
        if let Err(e) = self.orders.set_leverage(&signal.symbol, self.trading.leverage).await {
            return self.not_executed(&signal.symbol, "set_leverage", e.to_string());
        }
        let balance = match self.orders.available_balance().await {
            Ok(b) => b,
            Err(e) => return self.not_executed(&signal.symbol, "balance", e.to_string()),
        };

        let price = to_decimal(signal.entry_price);
        let quantity = match position_quantity(balance, &self.trading, price, &rules) {
            Ok(q) => q,
            Err(reason) => return self.skip(signal, reason),
        };

        let intent = OrderIntent::Open {
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            quantity,
        };
        let ack = match ordering::execute(self.orders.as_ref(), &intent).await {
            IntentResult::Executed(ack) => ack,
            IntentResult::NotExecuted(e) => return self.not_executed(&signal.symbol, "open", e),
        };

        let entry_price = if ack.avg_price > Decimal::ZERO { ack.avg_price } else { price };
        let position = Position::open(
            &signal.symbol,
            signal.direction,
            entry_price,
            ack.filled_qty(),
            to_decimal(self.trading.stop_loss_pct),
            signal.time,
        );
        self.state.upsert_position(position.clone()).await;
        self.state
            .ledger_handle()
            .write()
            .await
            .record_trade(&signal.symbol, signal.time);

        info!(
            symbol = %position.symbol,
            direction = %position.direction,
            entry = %position.entry_price,
            qty = %position.quantity,
            r = %position.r_value,
            "POSITIONS: position opened"
        );
        self.logger.log(LogEvent::PositionOpened {
            timestamp: EventLogger::timestamp(),
            symbol: position.symbol.clone(),
            direction: position.direction.to_string(),
            entry_price: to_f64(position.entry_price),
            quantity: to_f64(position.quantity),
            r_value: to_f64(position.r_value),
            order_id: ack.order_id,
        });
        EntryOutcome::Opened(position)
    }

    /// One risk tick over every open position.
    pub async fn refresh(&mut self) -> Vec<TickReport> {
        let mut reports = Vec::new();
        for pos in self.state.positions().await {
            reports.push(self.refresh_position(pos).await);
        }
        reports
    }

    async fn refresh_position(&mut self, pos: Position) -> TickReport {
        let symbol = pos.symbol.clone();
        let mark = match self.market.get_mark_price(&symbol).await {
            Ok(m) => m,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "POSITIONS: mark price unavailable");
                return TickReport {
                    symbol,
                    action: RiskAction::Hold,
                    outcome: TickOutcome::MarkUnavailable(e.to_string()),
                };
            }
        };

        let reverse = if self.params.reverse_signal_close {
            let higher = self
                .store
                .snapshot(&symbol, self.detector.config().higher_timeframe)
                .await;
            self.detector.trend_direction(&higher)
        } else {
            None
        };
        let step = self
            .rules
            .get(&symbol)
            .map(|r| r.step_size)
            .unwrap_or_else(|| SymbolRules::default().step_size);

        let check = risk::check(&pos, mark, &self.params, step, reverse);
        let tracked = check.tracked;
        let action = check.action;

        debug!(
            symbol = %symbol,
            mark = %mark,
            r_multiple = %tracked.r_multiple(mark).round_dp(2),
            pnl_pct = %tracked.pnl_pct().round_dp(3),
            trailing = ?tracked.trailing_stop_price,
            "POSITIONS: tick"
        );

        let quantity = match action.close_quantity(&tracked) {
            Some(q) => q,
            None => {
                self.state.upsert_position(tracked).await;
                return TickReport {
                    symbol,
                    action,
                    outcome: TickOutcome::Held,
                };
            }
        };

        let intent = OrderIntent::Close {
            symbol: symbol.clone(),
            direction: tracked.direction,
            quantity,
            reason: action.to_string(),
        };
        let result = ordering::execute(self.orders.as_ref(), &intent).await;
        let executed = result.executed_qty();
        let exit_price = match &result {
            IntentResult::Executed(ack) if ack.avg_price > Decimal::ZERO => ack.avg_price,
            _ => mark,
        };

        let outcome = match risk::apply_fill(&tracked, &action, executed, &self.params) {
            FillOutcome::NotExecuted => {
                let error = match result {
                    IntentResult::NotExecuted(e) => e,
                    IntentResult::Executed(_) => "no quantity executed".to_string(),
                };
                self.logger.log(LogEvent::OrderFailed {
                    timestamp: EventLogger::timestamp(),
                    symbol: symbol.clone(),
                    intent: intent.to_string(),
                    error: error.clone(),
                });
                self.state.upsert_position(tracked.clone()).await;
                TickOutcome::Failed(error)
            }
            FillOutcome::Reduced(next) => {
                info!(
                    symbol = %symbol,
                    action = %action,
                    executed = %executed,
                    closed = %next.closed_quantity(),
                    remaining = %next.quantity,
                    "POSITIONS: position reduced"
                );
                self.state.upsert_position(next).await;
                TickOutcome::Reduced
            }
            FillOutcome::Closed => {
                let realized = tracked.favorable_move(exit_price) * executed;
                info!(
                    symbol = %symbol,
                    action = %action,
                    exit = %exit_price,
                    pnl = %realized.round_dp(4),
                    "POSITIONS: position closed"
                );
                self.state.remove_position(&symbol).await;
                self.logger.log(LogEvent::PositionClosed {
                    timestamp: EventLogger::timestamp(),
                    symbol: symbol.clone(),
                    direction: tracked.direction.to_string(),
                    entry_price: to_f64(tracked.entry_price),
                    exit_price: to_f64(exit_price),
                    quantity: to_f64(tracked.original_quantity),
                    realized_pnl: to_f64(realized),
                    reason: action.to_string(),
                });
                TickOutcome::Closed
            }
        };

        if !matches!(outcome, TickOutcome::Failed(_)) {
            self.logger.log(LogEvent::RiskAction {
                timestamp: EventLogger::timestamp(),
                symbol: symbol.clone(),
                action: action.to_string(),
                mark_price: to_f64(mark),
                r_multiple: to_f64(tracked.r_multiple(mark)),
                quantity: to_f64(quantity),
                executed_qty: to_f64(executed),
            });
        }

        TickReport {
            symbol,
            action,
            outcome,
        }
    }

    /// Refresh loop plus signal intake. Entries and ticks are handled one at a time.
    pub async fn run(mut self, mut channels: PositionChannels, shutdown: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.trading.refresh_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            interval_secs = self.trading.refresh_interval_secs,
            "POSITIONS: position manager started"
        );

        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let reports = self.refresh().await;
                    let acted = reports.iter().filter(|r| r.action != RiskAction::Hold).count();
                    if acted > 0 {
                        debug!(positions = reports.len(), acted, at = %Utc::now(), "POSITIONS: tick done");
                    }
                }
                maybe_signal = channels.signal_rx.recv() => match maybe_signal {
                    Some(signal) => {
                        self.on_signal(&signal).await;
                    }
                    None => {
                        info!("POSITIONS: signal channel closed");
                        break;
                    }
                },
            }
        }
        info!("POSITIONS: position manager stopped");
    }
}
