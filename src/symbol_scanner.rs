// SYMBOL_SCANNER: liquidity-ranked symbol pool and batch rotation
// Pool refresh keeps the rotation pointer unless the pool composition changed

use crate::config::ScanConfig;
use crate::connection::MarketDataGateway;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Pool and rotation pointer. Lives for the whole process.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    pool: Vec<String>,
    batch_index: usize,
    last_refresh: Option<DateTime<Utc>>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_refresh {
            Some(at) => now - at >= interval || self.pool.is_empty(),
            None => true,
        }
    }

    /// Replace the pool with the top `pool_size` of `ranked`.
    ///
    /// Returns `true` when the composition changed, which also resets the pointer.
    /// A pool with the same members in a new order keeps the old order and pointer.
    pub fn refresh_pool(&mut self, ranked: &[String], pool_size: usize, now: DateTime<Utc>) -> bool {
        self.last_refresh = Some(now);
        let top: Vec<String> = ranked.iter().take(pool_size).cloned().collect();
        let old: BTreeSet<&String> = self.pool.iter().collect();
        let new: BTreeSet<&String> = top.iter().collect();
        if old == new {
            return false;
        }
        self.pool = top;
        self.batch_index = 0;
        true
    }

    pub fn batch_count(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            return 0;
        }
        self.pool.len().div_ceil(batch_size)
    }

    /// Next batch and its index; the pointer advances modulo the batch count.
    pub fn next_batch(&mut self, batch_size: usize) -> Option<(usize, Vec<String>)> {
        let count = self.batch_count(batch_size);
        if count == 0 {
            return None;
        }
        let idx = self.batch_index % count;
        let start = idx * batch_size;
        let end = (start + batch_size).min(self.pool.len());
        self.batch_index = (idx + 1) % count;
        Some((idx, self.pool[start..end].to_vec()))
    }
}

/// Pool maintenance against the market-data gateway.
pub struct SymbolScanner {
    market: Arc<dyn MarketDataGateway>,
    config: ScanConfig,
    state: ScanState,
}

impl SymbolScanner {
    pub fn new(market: Arc<dyn MarketDataGateway>, config: ScanConfig) -> Self {
        Self {
            market,
            config,
            state: ScanState::new(),
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn batch_count(&self) -> usize {
        self.state.batch_count(self.config.batch_size)
    }

    /// Refresh the pool when due. A failed ranking keeps the previous pool if there is one.
    pub async fn refresh_if_due(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let interval = Duration::minutes(self.config.pool_refresh_minutes as i64);
        if !self.state.needs_refresh(now, interval) {
            return Ok(false);
        }

        match self.market.get_liquidity_ranking().await {
            Ok(ranked) => {
                let changed = self.state.refresh_pool(&ranked, self.config.pool_size, now);
                if changed {
                    info!(
                        pool = self.state.pool().len(),
                        batches = self.batch_count(),
                        "SYMBOL_SCANNER: pool changed, rotation reset"
                    );
                }
                Ok(changed)
            }
            Err(e) if !self.state.pool().is_empty() => {
                warn!(error = %e, "SYMBOL_SCANNER: ranking failed, keeping previous pool");
                Ok(false)
            }
            Err(e) => Err(anyhow!("symbol ranking unavailable and pool empty: {}", e)),
        }
    }

    pub fn next_batch(&mut self) -> Option<(usize, Vec<String>)> {
        self.state.next_batch(self.config.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("S{:02}USDT", i)).collect()
    }

    #[test]
    fn rotation_covers_every_symbol_once() {
        let mut state = ScanState::new();
        state.refresh_pool(&symbols(25), 25, Utc::now());
        assert_eq!(state.batch_count(10), 3);

        let mut seen = Vec::new();
        for expected_idx in 0..3 {
            let (idx, batch) = state.next_batch(10).unwrap();
            assert_eq!(idx, expected_idx);
            seen.extend(batch);
        }
        assert_eq!(seen, symbols(25));
        assert_eq!(state.next_batch(10).unwrap().0, 0);
    }

    #[test]
    fn unchanged_pool_keeps_pointer_and_order() {
        let mut state = ScanState::new();
        let now = Utc::now();
        assert!(state.refresh_pool(&symbols(30), 30, now));
        state.next_batch(10);
        assert_eq!(state.batch_index(), 1);

        let mut reordered = symbols(30);
        reordered.reverse();
        assert!(!state.refresh_pool(&reordered, 30, now));
        assert_eq!(state.batch_index(), 1);
        assert_eq!(state.pool()[0], "S00USDT");
    }

    #[test]
    fn changed_pool_resets_pointer() {
        let mut state = ScanState::new();
        let now = Utc::now();
        state.refresh_pool(&symbols(30), 30, now);
        state.next_batch(10);
        state.next_batch(10);

        assert!(state.refresh_pool(&symbols(40), 40, now));
        assert_eq!(state.batch_index(), 0);
        assert_eq!(state.batch_count(10), 4);
    }

    #[test]
    fn pool_is_capped_at_top_k() {
        let mut state = ScanState::new();
        state.refresh_pool(&symbols(80), 50, Utc::now());
        assert_eq!(state.pool().len(), 50);
        assert_eq!(state.pool()[49], "S49USDT");
    }

    #[test]
    fn empty_pool_has_no_batch() {
        let mut state = ScanState::new();
        assert!(state.next_batch(10).is_none());
    }

    #[test]
    fn refresh_due_after_interval() {
        let mut state = ScanState::new();
        let now = Utc::now();
        assert!(state.needs_refresh(now, Duration::minutes(30)));
        state.refresh_pool(&symbols(3), 3, now);
        assert!(!state.needs_refresh(now + Duration::minutes(29), Duration::minutes(30)));
        assert!(state.needs_refresh(now + Duration::minutes(30), Duration::minutes(30)));
    }
}
