// Entry stage: four togglable filters on the lower timeframe, accepted by quorum

use crate::config::DetectorConfig;
use crate::indicators::{from_end, IndicatorSet};
use crate::types::{Candle, PositionDirection};
use serde::Serialize;
use std::fmt;

/// Minimum passed checks (disabled ones included) for an entry.
pub const QUORUM: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryFilter {
    PricePosition,
    Rsi,
    EmaTouch,
    Candle,
}

impl EntryFilter {
    pub const ALL: [EntryFilter; 4] = [
        EntryFilter::PricePosition,
        EntryFilter::Rsi,
        EntryFilter::EmaTouch,
        EntryFilter::Candle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntryFilter::PricePosition => "price",
            EntryFilter::Rsi => "rsi",
            EntryFilter::EmaTouch => "ema_touch",
            EntryFilter::Candle => "candle",
        }
    }

    fn enabled(&self, cfg: &DetectorConfig) -> bool {
        match self {
            EntryFilter::PricePosition => cfg.price_position_filter,
            EntryFilter::Rsi => cfg.rsi_filter,
            EntryFilter::EmaTouch => cfg.ema_touch_filter,
            EntryFilter::Candle => cfg.candle_filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCheck {
    pub filter: EntryFilter,
    pub enabled: bool,
    /// Disabled filters always pass
    pub passed: bool,
    pub detail: String,
}

/// Per-filter outcome of one entry evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterReport {
    pub direction: PositionDirection,
    pub checks: Vec<FilterCheck>,
}

impl FilterReport {
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn enabled_count(&self) -> usize {
        self.checks.iter().filter(|c| c.enabled).count()
    }

    pub fn enabled_passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.enabled && c.passed).count()
    }

    /// Quorum of passed checks, and at least one real pass when any filter is enabled.
    pub fn accepted(&self) -> bool {
        self.passed_count() >= QUORUM
            && (self.enabled_count() == 0 || self.enabled_passed_count() >= 1)
    }

    pub fn confidence(&self) -> f64 {
        self.passed_count() as f64 / EntryFilter::ALL.len() as f64
    }
}

impl fmt::Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} passed", self.passed_count(), self.checks.len())?;
        for check in &self.checks {
            let state = match (check.enabled, check.passed) {
                (false, _) => "off",
                (true, true) => "pass",
                (true, false) => "fail",
            };
            write!(f, "; {}={} ({})", check.filter.name(), state, check.detail)?;
        }
        Ok(())
    }
}

/// Run every filter against the lower-timeframe series in the trend's direction.
pub fn evaluate_entry(
    candles: &[Candle],
    ind: &IndicatorSet,
    direction: PositionDirection,
    cfg: &DetectorConfig,
) -> FilterReport {
    let checks = EntryFilter::ALL
        .iter()
        .map(|filter| {
            if !filter.enabled(cfg) {
                return FilterCheck {
                    filter: *filter,
                    enabled: false,
                    passed: true,
                    detail: "disabled".to_string(),
                };
            }
            let (passed, detail) = match filter {
                EntryFilter::PricePosition => price_position(candles, ind, direction),
                EntryFilter::Rsi => rsi_momentum(ind, direction, cfg),
                EntryFilter::EmaTouch => ema_touch(candles, ind, direction, cfg),
                EntryFilter::Candle => candle_body(candles, direction, cfg),
            };
            FilterCheck {
                filter: *filter,
                enabled: true,
                passed,
                detail,
            }
        })
        .collect();

    FilterReport { direction, checks }
}

fn price_position(candles: &[Candle], ind: &IndicatorSet, direction: PositionDirection) -> (bool, String) {
    let (close, ema) = match (candles.last(), from_end(&ind.ema_short, 0)) {
        (Some(c), Some(e)) => (c.close, e),
        _ => return (false, "no data".to_string()),
    };
    let passed = match direction {
        PositionDirection::Long => close > ema,
        PositionDirection::Short => close < ema,
    };
    (passed, format!("close {:.6} vs ema {:.6}", close, ema))
}

fn rsi_momentum(ind: &IndicatorSet, direction: PositionDirection, cfg: &DetectorConfig) -> (bool, String) {
    let (curr, prev) = match (from_end(&ind.rsi, 0), from_end(&ind.rsi, 1)) {
        (Some(c), Some(p)) => (c, p),
        _ => return (false, "no data".to_string()),
    };
    let passed = match direction {
        PositionDirection::Long => curr >= cfg.rsi_threshold && curr > prev,
        PositionDirection::Short => curr <= 100.0 - cfg.rsi_threshold && curr < prev,
    };
    (passed, format!("rsi {:.2} -> {:.2}", prev, curr))
}

fn ema_touch(
    candles: &[Candle],
    ind: &IndicatorSet,
    direction: PositionDirection,
    cfg: &DetectorConfig,
) -> (bool, String) {
    for back in 0..cfg.ema_touch_lookback {
        let (candle, ema) = match (
            candles.len().checked_sub(back + 1).map(|i| &candles[i]),
            from_end(&ind.ema_short, back),
        ) {
            (Some(c), Some(e)) => (c, e),
            _ => break,
        };
        let touched = match direction {
            PositionDirection::Long => candle.low <= ema,
            PositionDirection::Short => candle.high >= ema,
        };
        if touched {
            return (true, format!("touched {} bar(s) back", back));
        }
    }
    (false, format!("no touch in {} bars", cfg.ema_touch_lookback))
}

fn candle_body(candles: &[Candle], direction: PositionDirection, cfg: &DetectorConfig) -> (bool, String) {
    let last = match candles.last() {
        Some(c) => c,
        None => return (false, "no data".to_string()),
    };
    let colour_ok = match direction {
        PositionDirection::Long => last.is_green(),
        PositionDirection::Short => last.is_red(),
    };
    let body = last.body_pct();
    (
        colour_ok && body >= cfg.min_body_pct,
        format!("{} body {:.3}%", if last.is_green() { "green" } else if last.is_red() { "red" } else { "doji" }, body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(passes: [Option<bool>; 4]) -> FilterReport {
        FilterReport {
            direction: PositionDirection::Long,
            checks: EntryFilter::ALL
                .iter()
                .zip(passes.iter())
                .map(|(f, p)| FilterCheck {
                    filter: *f,
                    enabled: p.is_some(),
                    passed: p.unwrap_or(true),
                    detail: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn two_of_four_is_enough() {
        let r = report([Some(true), Some(true), Some(false), Some(false)]);
        assert!(r.accepted());
        assert_eq!(r.confidence(), 0.5);
    }

    #[test]
    fn one_of_four_is_rejected() {
        assert!(!report([Some(true), Some(false), Some(false), Some(false)]).accepted());
    }

    #[test]
    fn disabled_counts_as_passed() {
        let r = report([None, Some(true), Some(false), Some(false)]);
        assert_eq!(r.passed_count(), 2);
        assert!(r.accepted());
    }

    #[test]
    fn single_enabled_filter_failing_rejects() {
        let r = report([None, None, None, Some(false)]);
        assert_eq!(r.passed_count(), 3);
        assert!(!r.accepted());

        let r = report([None, None, None, Some(true)]);
        assert!(r.accepted());
        assert_eq!(r.confidence(), 1.0);
    }

    #[test]
    fn all_disabled_accepts() {
        assert!(report([None, None, None, None]).accepted());
    }

    #[test]
    fn display_lists_each_filter() {
        let text = report([Some(true), None, Some(false), Some(true)]).to_string();
        assert!(text.starts_with("3/4 passed"));
        assert!(text.contains("rsi=off"));
        assert!(text.contains("ema_touch=fail"));
    }
}
