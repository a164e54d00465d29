// CANDLE_STORE: bounded, time-ordered OHLCV series per (symbol, timeframe)
// Fed by the scan loop, read by the detector and by reverse-signal checks

use crate::types::{Candle, Timeframe};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_CAPACITY: usize = 200;

/// One series, most recent candle last, at most `capacity` entries.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    timeframe: Timeframe,
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleSeries {
    pub fn new(timeframe: Timeframe, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            timeframe,
            capacity,
            candles: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Merge a batch of candles (any order) into the series.
    ///
    /// - same open time as the newest stored candle: replaces it (still-forming bar)
    /// - older than the newest stored candle: ignored
    /// - newer: appended, evicting the oldest when full
    ///
    /// When the oldest new candle starts more than one bar after the newest stored
    /// one, the stored series no longer connects and is dropped first.
    pub fn merge(&mut self, incoming: &[Candle]) {
        let mut sorted: Vec<&Candle> = incoming.iter().collect();
        sorted.sort_by_key(|c| c.open_time);

        if let Some(newest) = self.last().map(|c| c.open_time) {
            let first_new = sorted.iter().find(|c| c.open_time > newest);
            if let Some(first_new) = first_new {
                if first_new.open_time - newest > self.timeframe.duration() {
                    self.candles.clear();
                }
            }
        }

        for candle in sorted {
            let newest = self.last().map(|c| c.open_time);
            match newest {
                Some(t) if candle.open_time == t => {
                    if let Some(slot) = self.candles.back_mut() {
                        *slot = candle.clone();
                    }
                }
                Some(t) if candle.open_time < t => {}
                _ => {
                    if self.candles.len() == self.capacity {
                        self.candles.pop_front();
                    }
                    self.candles.push_back(candle.clone());
                }
            }
        }
    }

    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }
}

/// Shared store of candle series, cheap to clone.
#[derive(Clone)]
pub struct CandleStore {
    capacity: usize,
    series: Arc<RwLock<HashMap<(String, Timeframe), CandleSeries>>>,
}

impl Default for CandleStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CandleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            series: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Merge fetched candles and return the resulting series.
    pub async fn merge(&self, symbol: &str, timeframe: Timeframe, candles: &[Candle]) -> Vec<Candle> {
        let mut series = self.series.write().await;
        let entry = series
            .entry((symbol.to_string(), timeframe))
            .or_insert_with(|| CandleSeries::new(timeframe, self.capacity));
        entry.merge(candles);
        entry.to_vec()
    }

    /// Copy of the series, empty when nothing is cached.
    pub async fn snapshot(&self, symbol: &str, timeframe: Timeframe) -> Vec<Candle> {
        let series = self.series.read().await;
        series
            .get(&(symbol.to_string(), timeframe))
            .map(|s| s.to_vec())
            .unwrap_or_default()
    }

    pub async fn len(&self, symbol: &str, timeframe: Timeframe) -> usize {
        let series = self.series.read().await;
        series
            .get(&(symbol.to_string(), timeframe))
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Drop every series of symbols that are no longer tracked.
    pub async fn retain_symbols(&self, keep: &[String]) {
        let mut series = self.series.write().await;
        series.retain(|(symbol, _), _| keep.iter().any(|k| k == symbol));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candle(minute: i64, close: f64) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut s = CandleSeries::new(Timeframe::M5, 3);
        let batch: Vec<Candle> = (0..5).map(|i| candle(i * 5, i as f64)).collect();
        s.merge(&batch);
        assert_eq!(s.len(), 3);
        let closes: Vec<f64> = s.to_vec().iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn same_open_time_replaces_last_and_older_is_ignored() {
        let mut s = CandleSeries::new(Timeframe::M5, 10);
        s.merge(&[candle(0, 1.0), candle(5, 2.0)]);
        s.merge(&[candle(5, 2.5)]);
        s.merge(&[candle(0, 9.0)]);
        let closes: Vec<f64> = s.to_vec().iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.0, 2.5]);
    }

    #[test]
    fn overlapping_refetch_appends_only_new_bars() {
        let mut s = CandleSeries::new(Timeframe::M5, 10);
        s.merge(&[candle(0, 1.0), candle(5, 2.0), candle(10, 3.0)]);
        s.merge(&[candle(5, 2.0), candle(10, 3.1), candle(15, 4.0)]);
        let closes: Vec<f64> = s.to_vec().iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.1, 4.0]);
    }

    #[test]
    fn gap_resets_series() {
        let mut s = CandleSeries::new(Timeframe::M5, 10);
        s.merge(&[candle(0, 1.0), candle(5, 2.0)]);
        s.merge(&[candle(60, 7.0), candle(65, 8.0)]);
        let closes: Vec<f64> = s.to_vec().iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![7.0, 8.0]);
    }

    #[tokio::test]
    async fn store_keys_by_symbol_and_timeframe() {
        let store = CandleStore::new(10);
        store.merge("BTCUSDT", Timeframe::M5, &[candle(0, 1.0)]).await;
        store.merge("BTCUSDT", Timeframe::M15, &[candle(0, 2.0), candle(15, 3.0)]).await;
        assert_eq!(store.len("BTCUSDT", Timeframe::M5).await, 1);
        assert_eq!(store.len("BTCUSDT", Timeframe::M15).await, 2);
        assert!(store.snapshot("ETHUSDT", Timeframe::M5).await.is_empty());

        store.retain_symbols(&["ETHUSDT".to_string()]).await;
        assert_eq!(store.len("BTCUSDT", Timeframe::M15).await, 0);
    }
}
