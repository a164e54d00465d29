use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use trend_bot::connection::{MarketDataGateway, OrderGateway};
use trend_bot::types::{Candle, OrderAck, OrderStatus, PositionSide, Side, SymbolRules, Timeframe};

/// In-memory market data. Symbols listed in `failing` error on every candle fetch.
#[derive(Default)]
pub struct MockMarket {
    pub candles: Mutex<HashMap<(String, Timeframe), Vec<Candle>>>,
    pub ranking: Mutex<Vec<String>>,
    pub marks: Mutex<HashMap<String, Decimal>>,
    pub failing: Mutex<HashSet<String>>,
    pub fetched: Mutex<Vec<String>>,
}

impl MockMarket {
    pub fn with_ranking(symbols: &[&str]) -> Self {
        let market = Self::default();
        *market.ranking.lock().unwrap() = symbols.iter().map(|s| s.to_string()).collect();
        market
    }

    pub fn set_candles(&self, symbol: &str, tf: Timeframe, candles: Vec<Candle>) {
        self.candles.lock().unwrap().insert((symbol.to_string(), tf), candles);
    }

    pub fn set_mark(&self, symbol: &str, mark: Decimal) {
        self.marks.lock().unwrap().insert(symbol.to_string(), mark);
    }

    pub fn fail(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }
}

#[async_trait]
impl MarketDataGateway for MockMarket {
    async fn get_candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        self.fetched.lock().unwrap().push(symbol.to_string());
        if self.failing.lock().unwrap().contains(symbol) {
            return Err(anyhow!("{} klines timed out", symbol));
        }
        let all = self
            .candles
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), timeframe))
            .cloned()
            .unwrap_or_default();
        let skip = all.len().saturating_sub(limit);
        Ok(all[skip..].to_vec())
    }

    async fn get_liquidity_ranking(&self) -> Result<Vec<String>> {
        Ok(self.ranking.lock().unwrap().clone())
    }

    async fn get_mark_price(&self, symbol: &str) -> Result<Decimal> {
        self.marks
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| anyhow!("no mark for {}", symbol))
    }

    async fn get_symbol_rules(&self, _symbol: &str) -> Result<SymbolRules> {
        Ok(SymbolRules::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CloseReply {
    Fill,
    Partial(Decimal),
    Reject,
}

/// Scripted order gateway. Opens always fill at `fill_price`; closes follow `closes`,
/// then fill in full once the script runs out.
pub struct MockOrders {
    pub balance: Decimal,
    pub fill_price: Mutex<Decimal>,
    pub closes: Mutex<VecDeque<CloseReply>>,
    pub close_calls: Mutex<Vec<Decimal>>,
    pub open_calls: Mutex<Vec<(String, Decimal)>>,
}

impl MockOrders {
    pub fn new(balance: Decimal, fill_price: Decimal) -> Self {
        Self {
            balance,
            fill_price: Mutex::new(fill_price),
            closes: Mutex::new(VecDeque::new()),
            close_calls: Mutex::new(Vec::new()),
            open_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, replies: &[CloseReply]) {
        self.closes.lock().unwrap().extend(replies.iter().copied());
    }

    pub fn set_fill_price(&self, price: Decimal) {
        *self.fill_price.lock().unwrap() = price;
    }

    fn ack(&self, qty: Decimal) -> OrderAck {
        OrderAck {
            order_id: format!("mock-{}", qty),
            status: OrderStatus::Filled,
            executed_qty: qty,
            avg_price: *self.fill_price.lock().unwrap(),
        }
    }
}

#[async_trait]
impl OrderGateway for MockOrders {
    async fn place_market_order(
        &self,
        symbol: &str,
        _side: Side,
        quantity: Decimal,
        _position_side: PositionSide,
    ) -> Result<OrderAck> {
        self.open_calls.lock().unwrap().push((symbol.to_string(), quantity));
        Ok(self.ack(quantity))
    }

    async fn close_position(&self, _symbol: &str, quantity: Decimal, _position_side: PositionSide) -> Result<OrderAck> {
        self.close_calls.lock().unwrap().push(quantity);
        let reply = self.closes.lock().unwrap().pop_front().unwrap_or(CloseReply::Fill);
        match reply {
            CloseReply::Fill => Ok(self.ack(quantity)),
            CloseReply::Partial(qty) => Ok(OrderAck {
                status: OrderStatus::PartiallyFilled,
                ..self.ack(qty)
            }),
            CloseReply::Reject => Err(anyhow!("reduce-only order rejected")),
        }
    }

    async fn set_leverage(&self, _symbol: &str, _leverage: u32) -> Result<()> {
        Ok(())
    }

    async fn available_balance(&self) -> Result<Decimal> {
        Ok(self.balance)
    }
}
