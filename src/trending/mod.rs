// TRENDING: two-stage signal detection
// Higher timeframe decides the direction, lower timeframe confirms the entry by quorum
// Only detects, never places orders - the position manager owns execution

pub mod entry;
pub mod multi_timeframe;
pub mod replay;

pub use entry::{evaluate_entry, EntryFilter, FilterCheck, FilterReport, QUORUM};
pub use multi_timeframe::{evaluate_trend, TrendReading};
pub use replay::{replay_signals, ReplayReport};

use crate::config::DetectorConfig;
use crate::indicators::IndicatorSet;
use crate::types::{Candle, PositionDirection, Signal, Timeframe};
use chrono::{DateTime, Utc};
use std::fmt;

/// Why the detector produced no signal. Diagnostic only, never retried.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    InsufficientData {
        timeframe: Timeframe,
        have: usize,
        need: usize,
    },
    NoTrend(TrendReading),
    WeakTrend(TrendReading),
    Quorum {
        trend: TrendReading,
        report: FilterReport,
    },
}

impl Rejection {
    /// Short tag for counters and JSON logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::InsufficientData { .. } => "insufficient_data",
            Rejection::NoTrend(_) => "no_trend",
            Rejection::WeakTrend(_) => "weak_trend",
            Rejection::Quorum { .. } => "quorum",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InsufficientData { timeframe, have, need } => {
                write!(f, "insufficient data on {}: {} candles, need {}", timeframe, have, need)
            }
            Rejection::NoTrend(r) => write!(
                f,
                "no trend: ema_short {:.6} ema_long {:.6} close {:.6}",
                r.ema_short, r.ema_long, r.close
            ),
            Rejection::WeakTrend(r) => write!(
                f,
                "weak trend: distance {:.3}% (ema_short {:.6} ema_long {:.6})",
                r.distance_pct, r.ema_short, r.ema_long
            ),
            Rejection::Quorum { report, .. } => {
                write!(f, "entry quorum not met for {}: {}", report.direction, report)
            }
        }
    }
}

/// Stateless detector over a fixed config.
#[derive(Debug, Clone)]
pub struct SignalDetector {
    cfg: DetectorConfig,
}

impl SignalDetector {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Run both stages for one symbol.
    ///
    /// `higher` and `lower` are the trend and entry timeframe series, most recent last.
    pub fn detect(
        &self,
        symbol: &str,
        higher: &[Candle],
        lower: &[Candle],
        now: DateTime<Utc>,
    ) -> Result<Signal, Rejection> {
        let cfg = &self.cfg;
        if !multi_timeframe::has_enough_candles(lower, cfg) {
            return Err(Rejection::InsufficientData {
                timeframe: cfg.lower_timeframe,
                have: lower.len(),
                need: cfg.min_candles(),
            });
        }

        let trend = evaluate_trend(higher, cfg)?;
        let direction = match trend.trend.as_direction() {
            Some(d) => d,
            None => return Err(Rejection::NoTrend(trend)),
        };

        let ind = IndicatorSet::compute(lower, cfg);
        let report = evaluate_entry(lower, &ind, direction, cfg);
        if !report.accepted() {
            return Err(Rejection::Quorum { trend, report });
        }

        let entry_price = match lower.last() {
            Some(c) => c.close,
            None => {
                return Err(Rejection::InsufficientData {
                    timeframe: cfg.lower_timeframe,
                    have: 0,
                    need: cfg.min_candles(),
                })
            }
        };

        Ok(Signal {
            symbol: symbol.to_string(),
            direction,
            time: now,
            entry_price,
            confidence: report.confidence(),
            reason: format!(
                "{}; {} entry {}",
                trend.describe(cfg),
                cfg.lower_timeframe,
                report
            ),
        })
    }

    /// Trend-stage direction only, used for reverse-signal exits on cached candles.
    pub fn trend_direction(&self, higher: &[Candle]) -> Option<PositionDirection> {
        evaluate_trend(higher, &self.cfg)
            .ok()
            .and_then(|r| r.trend.as_direction())
    }
}
