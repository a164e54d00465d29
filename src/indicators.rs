// INDICATORS: EMA, volume MA and RSI over candle series
// Pure functions; not enough data gives an empty vector, never a panic

use crate::config::DetectorConfig;
use crate::types::Candle;

/// Exponential moving average seeded with the simple average of the first `period` values.
///
/// Output is aligned to the input tail: `out.len() == values.len() - period + 1`,
/// `out.last()` belongs to `values.last()`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for v in &values[period..] {
        prev = (v - prev) * k + prev;
        out.push(prev);
    }
    out
}

/// Trailing simple average over `min(period, i + 1)` points, same length as the input.
pub fn volume_ma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len());
    let mut window_sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        window_sum += v;
        if i >= period {
            window_sum -= values[i - period];
        }
        let n = (i + 1).min(period);
        out.push(window_sum / n as f64);
    }
    out
}

/// Wilder RSI, same length as the input.
///
/// Indices before `period` hold the neutral 50. A zero average loss reads 100.
/// Fewer than `period + 1` values gives an empty vector.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period + 1 {
        return Vec::new();
    }

    let mut out = vec![50.0; values.len()];
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    let p = period as f64;
    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Value `back` positions before the newest one (`back = 0` is the newest).
pub fn from_end(values: &[f64], back: usize) -> Option<f64> {
    values.len().checked_sub(back + 1).map(|i| values[i])
}

/// Indicator arrays for one candle series, each aligned to the series tail.
///
/// Recomputed for every detection pass. Index with [`from_end`], never with a raw
/// candle index: the arrays have different lengths.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    pub ema_short: Vec<f64>,
    pub ema_long: Vec<f64>,
    pub volume_ma: Vec<f64>,
    pub rsi: Vec<f64>,
}

impl IndicatorSet {
    pub fn compute(candles: &[Candle], cfg: &DetectorConfig) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
        Self {
            ema_short: ema(&closes, cfg.ema_short),
            ema_long: ema(&closes, cfg.ema_long),
            volume_ma: volume_ma(&volumes, cfg.volume_ma_period),
            rsi: rsi(&closes, cfg.rsi_period),
        }
    }

    /// Length of the shortest array; bars further back than this cannot be evaluated.
    pub fn aligned_len(&self) -> usize {
        self.ema_short
            .len()
            .min(self.ema_long.len())
            .min(self.volume_ma.len())
            .min(self.rsi.len())
    }

    pub fn is_empty(&self) -> bool {
        self.aligned_len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_seeds_with_sma_and_aligns_to_tail() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = ema(&values, 3);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 2.0).abs() < 1e-12);
        // k = 0.5
        assert!((out[1] - 3.0).abs() < 1e-12);
        assert!((out[2] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let values = vec![42.5; 100];
        for v in ema(&values, 20) {
            assert!((v - 42.5).abs() < 1e-9);
        }
    }

    #[test]
    fn ema_converges_after_level_shift() {
        let mut values = vec![10.0; 30];
        values.extend(vec![20.0; 200]);
        let out = ema(&values, 20);
        assert!((out.last().copied().unwrap() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn ema_empty_when_short() {
        assert!(ema(&[1.0, 2.0], 3).is_empty());
        assert!(ema(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn volume_ma_uses_shrinking_window() {
        let out = volume_ma(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(out, vec![2.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn rsi_is_neutral_before_period_and_100_without_losses() {
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let out = rsi(&values, 14);
        assert_eq!(out.len(), 20);
        assert!(out[..14].iter().all(|v| *v == 50.0));
        assert!(out[14..].iter().all(|v| *v == 100.0));
    }

    #[test]
    fn rsi_stays_within_bounds() {
        let values: Vec<f64> = (0..200)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + (i % 7) as f64)
            .collect();
        for v in rsi(&values, 14) {
            assert!((0.0..=100.0).contains(&v), "rsi out of range: {}", v);
        }
    }

    #[test]
    fn rsi_zero_when_only_losses() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&values, 14);
        assert_eq!(*out.last().unwrap(), 0.0);
    }

    #[test]
    fn from_end_reads_tail() {
        let v = [1.0, 2.0, 3.0];
        assert_eq!(from_end(&v, 0), Some(3.0));
        assert_eq!(from_end(&v, 2), Some(1.0));
        assert_eq!(from_end(&v, 3), None);
    }

    #[test]
    fn indicator_set_aligns_on_shortest_series() {
        let candles: Vec<Candle> = (0..80)
            .map(|i| Candle {
                open_time: chrono::TimeZone::timestamp_opt(&chrono::Utc, 300 * i, 0).unwrap(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64 * 0.1,
                volume: 10.0,
            })
            .collect();
        let ind = IndicatorSet::compute(&candles, &DetectorConfig::default());
        assert_eq!(ind.ema_short.len(), 61);
        assert_eq!(ind.ema_long.len(), 21);
        assert_eq!(ind.volume_ma.len(), 80);
        assert_eq!(ind.rsi.len(), 80);
        assert_eq!(ind.aligned_len(), 21);
        assert!(!ind.is_empty());
        assert!(IndicatorSet::compute(&candles[..10], &DetectorConfig::default()).is_empty());
    }
}
