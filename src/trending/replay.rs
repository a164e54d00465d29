// Bar-by-bar replay of the detector over history (signal parity, no PnL)

use super::SignalDetector;
use crate::types::{Candle, Signal};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub bars: usize,
    pub signals: Vec<Signal>,
    /// Rejection counts keyed by `Rejection::kind`
    pub rejections: BTreeMap<&'static str, usize>,
}

/// Replay `detector` over `lower`, one entry bar at a time.
///
/// Each step sees at most `window` candles per timeframe, the same view the live
/// store keeps. A higher-timeframe candle becomes visible only once it has closed
/// by the entry bar's close, so no step reads prices from its future. Signals are
/// stamped with the entry bar's close.
pub fn replay_signals(
    detector: &SignalDetector,
    symbol: &str,
    higher: &[Candle],
    lower: &[Candle],
    window: usize,
) -> ReplayReport {
    let cfg = detector.config();
    let lower_step = cfg.lower_timeframe.duration();
    let higher_step = cfg.higher_timeframe.duration();
    let window = window.max(cfg.min_candles());
    let start = cfg.min_candles().saturating_sub(1);

    let mut report = ReplayReport::default();
    let mut higher_end = 0;
    for i in start..lower.len() {
        let bar = &lower[i];
        let bar_close = bar.open_time + lower_step;
        while higher_end < higher.len() && higher[higher_end].open_time + higher_step <= bar_close {
            higher_end += 1;
        }
        let lower_view = &lower[(i + 1).saturating_sub(window)..=i];
        let higher_view = &higher[higher_end.saturating_sub(window)..higher_end];
        report.bars += 1;

        match detector.detect(symbol, higher_view, lower_view, bar_close) {
            Ok(signal) => report.signals.push(signal),
            Err(rejection) => *report.rejections.entry(rejection.kind()).or_insert(0) += 1,
        }
    }
    report
}

