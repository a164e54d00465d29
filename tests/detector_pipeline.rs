mod helpers;

use helpers::{trend_series, utc};
use trend_bot::config::DetectorConfig;
use trend_bot::trending::{replay_signals, Rejection, SignalDetector};
use trend_bot::types::{Candle, PositionDirection, Timeframe};

/// 5m ramp, a three-bar dip through EMA20, then a strong green close back above it.
fn pullback_then_resume(first_open: chrono::DateTime<chrono::Utc>) -> Vec<Candle> {
    let mut candles = trend_series(195, 100.0, 0.2, Timeframe::M5, first_open);
    let mut push = |open: f64, close: f64, low: f64| {
        let open_time = candles[candles.len() - 1].open_time + Timeframe::M5.duration();
        candles.push(Candle {
            open_time,
            open,
            high: open.max(close) + 0.1,
            low,
            close,
            volume: 1_000.0,
        });
    };
    let mut close = 100.0 + 0.2 * 194.0;
    for _ in 0..3 {
        push(close, close - 1.0, close - 1.1);
        close -= 1.0;
    }
    push(close, close + 2.0, close - 0.1);
    candles
}

#[test]
fn pullback_in_uptrend_gives_long_signal() {
    let detector = SignalDetector::new(DetectorConfig::default());
    let start = utc(2024, 3, 1, 0, 0);
    let higher = trend_series(200, 100.0, 0.5, Timeframe::M15, start);
    let lower = pullback_then_resume(start);
    let now = utc(2024, 3, 3, 12, 0);

    let signal = detector.detect("BTCUSDT", &higher, &lower, now).unwrap();

    assert_eq!(signal.direction, PositionDirection::Long);
    assert_eq!(signal.time, now);
    assert!((signal.entry_price - lower.last().unwrap().close).abs() < 1e-9);
    assert!((signal.confidence - 1.0).abs() < 1e-9, "all four filters pass: {}", signal.reason);
    assert!(signal.reason.contains("ema_touch=pass"));
}

#[test]
fn steady_downtrend_gives_short_signal() {
    let detector = SignalDetector::new(DetectorConfig::default());
    let start = utc(2024, 3, 1, 0, 0);
    let higher = trend_series(200, 300.0, -0.5, Timeframe::M15, start);
    let lower = trend_series(200, 250.0, -0.2, Timeframe::M5, start);

    let signal = detector.detect("ETHUSDT", &higher, &lower, start).unwrap();

    assert_eq!(signal.direction, PositionDirection::Short);
    // price and candle pass; rsi pinned at 0 is not falling, no bar reaches the lagging ema
    assert!((signal.confidence - 0.5).abs() < 1e-9);
}

#[test]
fn short_history_is_rejected_before_any_indicator() {
    let detector = SignalDetector::new(DetectorConfig::default());
    let start = utc(2024, 3, 1, 0, 0);
    let higher = trend_series(200, 100.0, 0.5, Timeframe::M15, start);
    let lower = trend_series(30, 100.0, 0.2, Timeframe::M5, start);

    match detector.detect("BTCUSDT", &higher, &lower, start) {
        Err(Rejection::InsufficientData { timeframe, have, need }) => {
            assert_eq!(timeframe, Timeframe::M5);
            assert_eq!(have, 30);
            assert_eq!(need, 70);
        }
        other => panic!("expected insufficient data, got {:?}", other.map(|s| s.reason)),
    }
}

#[test]
fn close_back_under_short_ema_has_no_trend() {
    let detector = SignalDetector::new(DetectorConfig::default());
    let start = utc(2024, 3, 1, 0, 0);
    let mut higher = trend_series(200, 100.0, 0.5, Timeframe::M15, start);
    // EMAs still stacked upward but the last close sits between them
    if let Some(last) = higher.last_mut() {
        last.close -= 8.0;
        last.low = last.close - 0.1;
    }
    let lower = trend_series(200, 100.0, 0.2, Timeframe::M5, start);

    let err = detector.detect("BTCUSDT", &higher, &lower, start).unwrap_err();
    assert_eq!(err.kind(), "no_trend");
}

#[test]
fn shallow_slope_is_a_weak_trend() {
    let detector = SignalDetector::new(DetectorConfig::default());
    let start = utc(2024, 3, 1, 0, 0);
    let higher = trend_series(200, 100.0, 0.001, Timeframe::M15, start);
    let lower = trend_series(200, 100.0, 0.2, Timeframe::M5, start);

    let err = detector.detect("BTCUSDT", &higher, &lower, start).unwrap_err();
    assert_eq!(err.kind(), "weak_trend");
}

#[test]
fn quorum_failure_reports_every_filter() {
    let detector = SignalDetector::new(DetectorConfig::default());
    let start = utc(2024, 3, 1, 0, 0);
    let higher = trend_series(200, 100.0, 0.5, Timeframe::M15, start);
    // Entry timeframe falling against the uptrend: price, rsi and candle all fail
    let lower = trend_series(200, 250.0, -0.2, Timeframe::M5, start);

    match detector.detect("BTCUSDT", &higher, &lower, start) {
        Err(Rejection::Quorum { report, .. }) => {
            assert_eq!(report.direction, PositionDirection::Long);
            assert_eq!(report.checks.len(), 4);
            assert!(!report.accepted());
        }
        other => panic!("expected quorum rejection, got {:?}", other.map(|s| s.reason)),
    }
}

#[test]
fn replay_walks_every_bar_after_warmup() {
    let detector = SignalDetector::new(DetectorConfig::default());
    let start = utc(2024, 3, 1, 0, 0);
    let higher = trend_series(300, 100.0, 0.5, Timeframe::M15, start - Timeframe::M15.duration() * 100);
    let lower = trend_series(150, 150.0, 0.2, Timeframe::M5, start);

    let report = replay_signals(&detector, "BTCUSDT", &higher, &lower, 200);

    assert_eq!(report.bars, 150 - 69);
    assert_eq!(report.signals.len() + report.rejections.values().sum::<usize>(), report.bars);
    assert!(!report.signals.is_empty());
    let first = &report.signals[0];
    assert_eq!(first.direction, PositionDirection::Long);
    assert_eq!(first.time, lower[69].open_time + Timeframe::M5.duration());
}

#[test]
fn replay_waits_for_the_higher_bar_to_close() {
    let detector = SignalDetector::new(DetectorConfig::default());
    let start = utc(2024, 3, 1, 0, 0);
    let mut higher = trend_series(100, 100.0, 0.5, Timeframe::M15, start);
    // The last 15m bar closes well under EMA20, which flattens the trend once it is final
    let reversal_open = start + Timeframe::M15.duration() * 100;
    higher.push(Candle {
        open_time: reversal_open,
        open: 149.5,
        high: 149.6,
        low: 139.9,
        close: 140.0,
        volume: 1_000.0,
    });
    // lower[69] is the first 5m bar inside the reversal bar, lower[71] closes with it
    let lower = trend_series(72, 150.0, 0.2, Timeframe::M5, reversal_open - Timeframe::M5.duration() * 69);

    let report = replay_signals(&detector, "BTCUSDT", &higher, &lower, 200);

    assert_eq!(report.bars, 3);
    let times: Vec<_> = report.signals.iter().map(|s| s.time).collect();
    assert_eq!(
        times,
        vec![
            reversal_open + Timeframe::M5.duration(),
            reversal_open + Timeframe::M5.duration() * 2
        ]
    );
    assert_eq!(report.rejections.get("no_trend"), Some(&1));
}
