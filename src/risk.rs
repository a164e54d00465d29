// RISK: per-tick exit decisions for one open position
// Pure functions: a tick produces a tracked Position plus at most one tagged action,
// and a confirmed fill produces the next Position

use crate::config::TradingConfig;
use crate::types::{Position, PositionDirection};
use crate::utils::{quantize_decimal, to_decimal};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Exit parameters converted to exact decimals once per cycle.
#[derive(Debug, Clone)]
pub struct RiskParams {
    pub take_profit_pct: Decimal,
    pub partial_tp_enabled: bool,
    pub r1: Decimal,
    pub r1_fraction: Decimal,
    pub r2: Decimal,
    pub r3: Decimal,
    pub trailing_stop_enabled: bool,
    pub trailing_stop_trigger_r: Decimal,
    pub trailing_stop_move_to_breakeven: bool,
    pub breakeven_enabled: bool,
    pub reverse_signal_close: bool,
}

impl RiskParams {
    pub fn from_config(cfg: &TradingConfig) -> Self {
        Self {
            take_profit_pct: to_decimal(cfg.take_profit_pct),
            partial_tp_enabled: cfg.partial_tp_enabled,
            r1: to_decimal(cfg.partial_tp_r1),
            r1_fraction: to_decimal(cfg.partial_tp_r1_fraction),
            r2: to_decimal(cfg.partial_tp_r2),
            r3: to_decimal(cfg.partial_tp_r3),
            trailing_stop_enabled: cfg.trailing_stop_enabled,
            trailing_stop_trigger_r: to_decimal(cfg.trailing_stop_trigger_r),
            trailing_stop_move_to_breakeven: cfg.trailing_stop_move_to_breakeven,
            breakeven_enabled: cfg.breakeven_enabled,
            reverse_signal_close: cfg.reverse_signal_close,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TpTier {
    R1,
    R2,
    R3,
}

/// The single action a risk tick decided on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RiskAction {
    Hold,
    /// Simple take-profit, full close
    TakeProfit,
    /// Ladder tier; `quantity` is what to close now
    PartialTakeProfit { tier: TpTier, quantity: Decimal },
    TrailingStop { stop: Decimal },
    StopLoss { stop: Decimal },
    ReverseSignal,
}

impl RiskAction {
    /// Quantity to close for this action, `None` for `Hold`.
    pub fn close_quantity(&self, pos: &Position) -> Option<Decimal> {
        match self {
            RiskAction::Hold => None,
            RiskAction::PartialTakeProfit { quantity, .. } => Some((*quantity).min(pos.quantity)),
            _ => Some(pos.quantity),
        }
    }

    pub fn is_full_close(&self, pos: &Position) -> bool {
        match self.close_quantity(pos) {
            Some(q) => q >= pos.quantity,
            None => false,
        }
    }
}

impl fmt::Display for RiskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskAction::Hold => write!(f, "hold"),
            RiskAction::TakeProfit => write!(f, "take profit"),
            RiskAction::PartialTakeProfit { tier, quantity } => {
                write!(f, "partial take profit {:?} qty {}", tier, quantity)
            }
            RiskAction::TrailingStop { stop } => write!(f, "trailing stop hit at {}", stop),
            RiskAction::StopLoss { stop } => write!(f, "stop loss hit at {}", stop),
            RiskAction::ReverseSignal => write!(f, "reverse signal"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskCheck {
    /// Position with the new mark, extremes and trailing stop applied
    pub tracked: Position,
    pub action: RiskAction,
}

/// Outcome of applying an order acknowledgement to a position.
#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    /// Nothing executed; keep the position as it was
    NotExecuted,
    Reduced(Position),
    Closed,
}

/// Refresh mark, running extremes and the trailing stop.
///
/// The trailing stop activates once the best move reaches `trigger_r` R and then
/// trails the extreme by the same distance. It only ever tightens.
pub fn track(pos: &Position, mark: Decimal, params: &RiskParams) -> Position {
    let mut next = pos.clone();
    next.mark_price = mark;
    next.highest_price = next.highest_price.max(mark);
    next.lowest_price = next.lowest_price.min(mark);

    if params.trailing_stop_enabled && next.r_value > Decimal::ZERO {
        let distance = params.trailing_stop_trigger_r * next.r_value;
        let best_move = next.favorable_move(next.best_price());
        if best_move >= distance {
            let mut candidate = match next.direction {
                PositionDirection::Long => next.highest_price - distance,
                PositionDirection::Short => next.lowest_price + distance,
            };
            if params.trailing_stop_move_to_breakeven {
                candidate = match next.direction {
                    PositionDirection::Long => candidate.max(next.entry_price),
                    PositionDirection::Short => candidate.min(next.entry_price),
                };
            }
            next.trailing_stop_price = Some(match (next.trailing_stop_price, next.direction) {
                (Some(prev), PositionDirection::Long) => prev.max(candidate),
                (Some(prev), PositionDirection::Short) => prev.min(candidate),
                (None, _) => candidate,
            });
        }
    }

    next
}

fn crossed(direction: PositionDirection, mark: Decimal, stop: Decimal) -> bool {
    match direction {
        PositionDirection::Long => mark <= stop,
        PositionDirection::Short => mark >= stop,
    }
}

/// Pick the first matching action in fixed priority order:
/// simple TP, partial ladder, trailing stop, static stop, reverse signal.
///
/// `pos` must already be tracked. `reverse_trend` is the current higher-timeframe
/// direction, if one is known.
pub fn evaluate(
    pos: &Position,
    params: &RiskParams,
    step_size: Decimal,
    reverse_trend: Option<PositionDirection>,
) -> RiskAction {
    let mark = pos.mark_price;
    let tp = pos.take_profit;

    if !params.partial_tp_enabled {
        if pos.pnl_pct() >= params.take_profit_pct {
            return RiskAction::TakeProfit;
        }
    } else if pos.r_value > Decimal::ZERO {
        let r = pos.r_multiple(mark);
        if !tp.r1_done && r >= params.r1 {
            let split = quantize_decimal(pos.quantity * params.r1_fraction, step_size);
            let quantity = if split <= Decimal::ZERO || split >= pos.quantity {
                pos.quantity
            } else {
                split
            };
            return RiskAction::PartialTakeProfit { tier: TpTier::R1, quantity };
        }
        if tp.r1_done && !tp.r2_done && r >= params.r2 {
            return RiskAction::PartialTakeProfit {
                tier: TpTier::R2,
                quantity: pos.quantity,
            };
        }
        if !tp.r2_done && !tp.r3_done && r >= params.r3 {
            return RiskAction::PartialTakeProfit {
                tier: TpTier::R3,
                quantity: pos.quantity,
            };
        }
    }

    if let Some(stop) = pos.trailing_stop_price {
        if crossed(pos.direction, mark, stop) {
            return RiskAction::TrailingStop { stop };
        }
    }

    let stop = pos.stop_loss_price();
    if pos.r_value > Decimal::ZERO && crossed(pos.direction, mark, stop) {
        return RiskAction::StopLoss { stop };
    }

    if params.reverse_signal_close && reverse_trend == Some(pos.direction.opposite()) {
        return RiskAction::ReverseSignal;
    }

    RiskAction::Hold
}

pub fn check(
    pos: &Position,
    mark: Decimal,
    params: &RiskParams,
    step_size: Decimal,
    reverse_trend: Option<PositionDirection>,
) -> RiskCheck {
    let tracked = track(pos, mark, params);
    let action = evaluate(&tracked, params, step_size, reverse_trend);
    RiskCheck { tracked, action }
}

/// Apply an executed quantity for `action` to `pos`.
///
/// Zero executed leaves the position untouched so the next tick retries. R1 marks
/// its tier even on a partial fill. Every other tier only completes by closing the
/// whole remainder.
pub fn apply_fill(pos: &Position, action: &RiskAction, executed: Decimal, params: &RiskParams) -> FillOutcome {
    if executed <= Decimal::ZERO {
        return FillOutcome::NotExecuted;
    }
    let executed = executed.min(pos.quantity);
    let remaining = pos.quantity - executed;
    if remaining <= Decimal::ZERO {
        return FillOutcome::Closed;
    }

    let mut next = pos.clone();
    next.quantity = remaining;
    if let RiskAction::PartialTakeProfit { tier: TpTier::R1, .. } = action {
        next.take_profit.r1_done = true;
        if params.breakeven_enabled {
            next.breakeven_applied = true;
        }
    }
    FillOutcome::Reduced(next)
}
