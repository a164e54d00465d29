// CONNECTION: exchange-facing gateways
// Market data in, order intents out. The core only talks to these traits.

pub mod paper;
pub mod rest;

pub use paper::PaperOrderGateway;
pub use rest::BinanceMarketData;

use crate::types::{Candle, OrderAck, PositionSide, Side, SymbolRules, Timeframe};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Read-only market data. Every call may fail; callers isolate failures per symbol.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Most recent `limit` candles, oldest first.
    async fn get_candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>>;
    /// Tradable symbols ranked by 24h quote volume, most liquid first.
    async fn get_liquidity_ranking(&self) -> Result<Vec<String>>;
    async fn get_mark_price(&self, symbol: &str) -> Result<Decimal>;
    async fn get_symbol_rules(&self, symbol: &str) -> Result<SymbolRules>;
}

/// Order execution. An `Err` or an ack without executed quantity means "not executed".
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        position_side: PositionSide,
    ) -> Result<OrderAck>;

    /// Reduce-only market close of `quantity` on the given position side.
    async fn close_position(&self, symbol: &str, quantity: Decimal, position_side: PositionSide) -> Result<OrderAck>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()>;

    /// Balance usable as margin for new positions (quote asset).
    async fn available_balance(&self) -> Result<Decimal>;
}
