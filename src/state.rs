// STATE: what the two loops share
// Only the position manager writes positions and the ledger; the scan loop reads

use crate::risk_manager::TradeLedger;
use crate::types::Position;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct SharedState {
    positions: Arc<RwLock<HashMap<String, Position>>>,
    ledger: Arc<RwLock<TradeLedger>>,
    auto_trade: Arc<AtomicBool>,
}

impl SharedState {
    pub fn new(auto_trade: bool) -> Self {
        Self {
            positions: Arc::new(RwLock::new(HashMap::new())),
            ledger: Arc::new(RwLock::new(TradeLedger::new())),
            auto_trade: Arc::new(AtomicBool::new(auto_trade)),
        }
    }

    pub fn auto_trade_enabled(&self) -> bool {
        self.auto_trade.load(Ordering::SeqCst)
    }

    pub fn set_auto_trade(&self, enabled: bool) {
        self.auto_trade.store(enabled, Ordering::SeqCst);
    }

    pub async fn open_count(&self) -> usize {
        self.positions.read().await.len()
    }

    pub async fn has_position(&self, symbol: &str) -> bool {
        self.positions.read().await.contains_key(symbol)
    }

    pub async fn position(&self, symbol: &str) -> Option<Position> {
        self.positions.read().await.get(symbol).cloned()
    }

    /// Copy of every open position, sorted by symbol.
    pub async fn positions(&self) -> Vec<Position> {
        let mut all: Vec<Position> = self.positions.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    pub async fn ledger(&self) -> TradeLedger {
        self.ledger.read().await.clone()
    }

    pub(crate) async fn upsert_position(&self, position: Position) {
        self.positions
            .write()
            .await
            .insert(position.symbol.clone(), position);
    }

    pub(crate) async fn remove_position(&self, symbol: &str) -> Option<Position> {
        self.positions.write().await.remove(symbol)
    }

    pub(crate) fn ledger_handle(&self) -> Arc<RwLock<TradeLedger>> {
        self.ledger.clone()
    }
}
