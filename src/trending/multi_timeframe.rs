// Trend stage: direction and strength of the higher timeframe

use super::Rejection;
use crate::config::DetectorConfig;
use crate::indicators::{from_end, IndicatorSet};
use crate::types::{Candle, TrendDirection};
use crate::utils::pct_distance;

/// Values the trend stage decided on, kept for reason text and logs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendReading {
    pub trend: TrendDirection,
    pub ema_short: f64,
    pub ema_long: f64,
    pub close: f64,
    /// |ema_short - ema_long| / ema_long in percent
    pub distance_pct: f64,
    /// Last volume over its moving average
    pub volume_ratio: f64,
}

impl TrendReading {
    pub fn describe(&self, cfg: &DetectorConfig) -> String {
        format!(
            "{} trend {:?} (ema{} {:.6} / ema{} {:.6}, close {:.6}, distance {:.3}%, vol x{:.2})",
            cfg.higher_timeframe,
            self.trend,
            cfg.ema_short,
            self.ema_short,
            cfg.ema_long,
            self.ema_long,
            self.close,
            self.distance_pct,
            self.volume_ratio
        )
    }
}

pub fn has_enough_candles(candles: &[Candle], cfg: &DetectorConfig) -> bool {
    candles.len() >= cfg.min_candles()
}

/// Classify the higher-timeframe trend.
///
/// Long needs ema_short > ema_long and close > ema_short, short the mirror. A
/// confirmed direction whose EMA distance is under `min_trend_distance_pct` is
/// rejected as weak.
pub fn evaluate_trend(candles: &[Candle], cfg: &DetectorConfig) -> Result<TrendReading, Rejection> {
    if !has_enough_candles(candles, cfg) {
        return Err(Rejection::InsufficientData {
            timeframe: cfg.higher_timeframe,
            have: candles.len(),
            need: cfg.min_candles(),
        });
    }

    let ind = IndicatorSet::compute(candles, cfg);
    let (ema_short, ema_long, volume_ma) = match (
        from_end(&ind.ema_short, 0),
        from_end(&ind.ema_long, 0),
        from_end(&ind.volume_ma, 0),
    ) {
        (Some(s), Some(l), Some(v)) => (s, l, v),
        _ => {
            return Err(Rejection::InsufficientData {
                timeframe: cfg.higher_timeframe,
                have: candles.len(),
                need: cfg.min_candles(),
            })
        }
    };
    let last = match candles.last() {
        Some(c) => c,
        None => {
            return Err(Rejection::InsufficientData {
                timeframe: cfg.higher_timeframe,
                have: 0,
                need: cfg.min_candles(),
            })
        }
    };

    let close = last.close;
    let trend = if ema_short > ema_long && close > ema_short {
        TrendDirection::Up
    } else if ema_short < ema_long && close < ema_short {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };

    let reading = TrendReading {
        trend,
        ema_short,
        ema_long,
        close,
        distance_pct: pct_distance(ema_short, ema_long),
        volume_ratio: if volume_ma > 0.0 { last.volume / volume_ma } else { 0.0 },
    };

    if reading.trend == TrendDirection::Flat {
        return Err(Rejection::NoTrend(reading));
    }
    if reading.distance_pct < cfg.min_trend_distance_pct {
        return Err(Rejection::WeakTrend(reading));
    }
    Ok(reading)
}
