// RISK_MANAGER: entry gating and position sizing
// Caps (max positions, daily trades), per-symbol cooldown, size from balance and leverage

use crate::config::TradingConfig;
use crate::types::SymbolRules;
use crate::utils::{quantize_decimal, to_decimal};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;

/// Why an entry was not attempted. Normal control flow, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    AutoTradeDisabled,
    AlreadyOpen,
    MaxPositions { open: usize, max: usize },
    DailyLimit { count: u32, limit: u32 },
    Cooldown { remaining_secs: i64 },
    BelowMinNotional { notional: Decimal, min: Decimal },
}

impl SkipReason {
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::AutoTradeDisabled => "auto_trade_disabled",
            SkipReason::AlreadyOpen => "already_open",
            SkipReason::MaxPositions { .. } => "max_positions",
            SkipReason::DailyLimit { .. } => "daily_limit",
            SkipReason::Cooldown { .. } => "cooldown",
            SkipReason::BelowMinNotional { .. } => "below_min_notional",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AutoTradeDisabled => write!(f, "auto trading disabled"),
            SkipReason::AlreadyOpen => write!(f, "position already open"),
            SkipReason::MaxPositions { open, max } => write!(f, "max positions reached ({}/{})", open, max),
            SkipReason::DailyLimit { count, limit } => write!(f, "daily trade limit reached ({}/{})", count, limit),
            SkipReason::Cooldown { remaining_secs } => write!(f, "cooldown active ({}s left)", remaining_secs),
            SkipReason::BelowMinNotional { notional, min } => {
                write!(f, "order notional {} below minimum {}", notional, min)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntryLimits {
    pub max_positions: usize,
    pub daily_trade_limit: u32,
    pub cooldown: Duration,
}

impl EntryLimits {
    pub fn from_config(cfg: &TradingConfig) -> Self {
        Self {
            max_positions: cfg.max_positions,
            daily_trade_limit: cfg.daily_trade_limit,
            cooldown: Duration::seconds(cfg.cooldown_secs as i64),
        }
    }
}

/// Last trade time per symbol and the UTC-day trade counter.
#[derive(Debug, Clone, Default)]
pub struct TradeLedger {
    last_trade: HashMap<String, DateTime<Utc>>,
    day: Option<NaiveDate>,
    daily_count: u32,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_trade(&mut self, symbol: &str, at: DateTime<Utc>) {
        let today = at.date_naive();
        if self.day != Some(today) {
            self.day = Some(today);
            self.daily_count = 0;
        }
        self.daily_count += 1;
        self.last_trade.insert(symbol.to_string(), at);
    }

    /// Trades recorded on `now`'s UTC date.
    pub fn trades_today(&self, now: DateTime<Utc>) -> u32 {
        if self.day == Some(now.date_naive()) {
            self.daily_count
        } else {
            0
        }
    }

    pub fn last_trade(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.last_trade.get(symbol).copied()
    }

    /// Time left until `symbol` may trade again, `None` once `at >= last_trade + cooldown`.
    pub fn cooldown_remaining(&self, symbol: &str, at: DateTime<Utc>, cooldown: Duration) -> Option<Duration> {
        let last = self.last_trade.get(symbol)?;
        let until = *last + cooldown;
        if at < until {
            Some(until - at)
        } else {
            None
        }
    }
}

/// Caps and cooldown, shared by the scan loop (pre-fetch) and the position manager.
pub fn check_limits(
    symbol: &str,
    open_positions: usize,
    ledger: &TradeLedger,
    limits: &EntryLimits,
    at: DateTime<Utc>,
) -> Result<(), SkipReason> {
    if open_positions >= limits.max_positions {
        return Err(SkipReason::MaxPositions {
            open: open_positions,
            max: limits.max_positions,
        });
    }
    let count = ledger.trades_today(at);
    if count >= limits.daily_trade_limit {
        return Err(SkipReason::DailyLimit {
            count,
            limit: limits.daily_trade_limit,
        });
    }
    if let Some(remaining) = ledger.cooldown_remaining(symbol, at, limits.cooldown) {
        return Err(SkipReason::Cooldown {
            remaining_secs: remaining.num_seconds(),
        });
    }
    Ok(())
}

/// Quantity for a new position: balance x pct x leverage / price, floored to the step.
pub fn position_quantity(
    available_balance: Decimal,
    cfg: &TradingConfig,
    price: Decimal,
    rules: &SymbolRules,
) -> Result<Decimal, SkipReason> {
    if price <= Decimal::ZERO {
        return Err(SkipReason::BelowMinNotional {
            notional: Decimal::ZERO,
            min: rules.min_notional,
        });
    }
    let margin = available_balance * to_decimal(cfg.position_size_pct) / Decimal::ONE_HUNDRED;
    let raw = margin * Decimal::from(cfg.leverage) / price;
    let qty = quantize_decimal(raw, rules.step_size);
    let notional = qty * price;
    if qty < rules.min_qty || notional < rules.min_notional {
        return Err(SkipReason::BelowMinNotional {
            notional,
            min: rules.min_notional,
        });
    }
    Ok(qty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
    }

    fn limits() -> EntryLimits {
        EntryLimits {
            max_positions: 2,
            daily_trade_limit: 3,
            cooldown: Duration::minutes(5),
        }
    }

    #[test]
    fn cooldown_blocks_until_five_minutes_pass() {
        let mut ledger = TradeLedger::new();
        ledger.record_trade("BTCUSDT", t(10, 0));
        assert!(matches!(
            check_limits("BTCUSDT", 0, &ledger, &limits(), t(10, 4)),
            Err(SkipReason::Cooldown { remaining_secs: 60 })
        ));
        assert!(check_limits("BTCUSDT", 0, &ledger, &limits(), t(10, 5)).is_ok());
        assert!(check_limits("ETHUSDT", 0, &ledger, &limits(), t(10, 1)).is_ok());
    }

    #[test]
    fn max_positions_checked_first() {
        let ledger = TradeLedger::new();
        assert_eq!(
            check_limits("BTCUSDT", 2, &ledger, &limits(), t(9, 0)),
            Err(SkipReason::MaxPositions { open: 2, max: 2 })
        );
    }

    #[test]
    fn daily_counter_resets_on_new_utc_day() {
        let mut ledger = TradeLedger::new();
        for (i, s) in ["A", "B", "C"].iter().enumerate() {
            ledger.record_trade(s, t(1, i as u32));
        }
        assert!(matches!(
            check_limits("D", 0, &ledger, &limits(), t(12, 0)),
            Err(SkipReason::DailyLimit { count: 3, limit: 3 })
        ));

        let tomorrow = Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 1).unwrap();
        assert_eq!(ledger.trades_today(tomorrow), 0);
        assert!(check_limits("D", 0, &ledger, &limits(), tomorrow).is_ok());
        ledger.record_trade("D", tomorrow);
        assert_eq!(ledger.trades_today(tomorrow), 1);
    }

    #[test]
    fn sizing_floors_to_step() {
        let cfg = TradingConfig::default();
        // 1000 * 10% * 10x / 30000 = 0.0333.. -> 0.033
        let qty = position_quantity(dec!(1000), &cfg, dec!(30000), &SymbolRules::default()).unwrap();
        assert_eq!(qty, dec!(0.033));
    }

    #[test]
    fn sizing_rejects_dust() {
        let cfg = TradingConfig::default();
        let err = position_quantity(dec!(1), &cfg, dec!(30000), &SymbolRules::default()).unwrap_err();
        assert_eq!(err.kind(), "below_min_notional");
    }
}
