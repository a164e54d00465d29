// Paper order gateway: fills market orders at the current mark price
// Keeps a simulated wallet so sizing and PnL behave like a live account

use super::{MarketDataGateway, OrderGateway};
use crate::types::{OrderAck, OrderStatus, PositionSide, Side};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct PaperPosition {
    quantity: Decimal,
    entry_price: Decimal,
    leverage: u32,
}

#[derive(Debug, Default)]
struct PaperWallet {
    balance: Decimal,
    leverage: HashMap<String, u32>,
    positions: HashMap<(String, PositionSide), PaperPosition>,
}

impl PaperWallet {
    fn used_margin(&self) -> Decimal {
        self.positions
            .values()
            .map(|p| p.quantity * p.entry_price / Decimal::from(p.leverage.max(1)))
            .sum()
    }
}

pub struct PaperOrderGateway {
    market: Arc<dyn MarketDataGateway>,
    wallet: Mutex<PaperWallet>,
}

impl PaperOrderGateway {
    pub fn new(market: Arc<dyn MarketDataGateway>, starting_balance: Decimal) -> Self {
        Self {
            market,
            wallet: Mutex::new(PaperWallet {
                balance: starting_balance,
                ..PaperWallet::default()
            }),
        }
    }

    /// Wallet balance including realised PnL, ignoring margin in use.
    pub async fn wallet_balance(&self) -> Decimal {
        self.wallet.lock().await.balance
    }

    fn ack(status: OrderStatus, executed_qty: Decimal, avg_price: Decimal) -> OrderAck {
        OrderAck {
            order_id: format!("paper-{}", Uuid::new_v4()),
            status,
            executed_qty,
            avg_price,
        }
    }
}

#[async_trait]
impl OrderGateway for PaperOrderGateway {
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        position_side: PositionSide,
    ) -> Result<OrderAck> {
        if quantity <= Decimal::ZERO {
            return Err(anyhow!("order quantity must be positive, got {}", quantity));
        }
        let expected = match position_side {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        };
        if side != expected {
            return Err(anyhow!(
                "{} order cannot open a {} position",
                side.to_binance_str(),
                position_side.to_binance_str()
            ));
        }

        let price = self.market.get_mark_price(symbol).await?;
        let mut wallet = self.wallet.lock().await;
        let leverage = wallet.leverage.get(symbol).copied().unwrap_or(1);
        let required = quantity * price / Decimal::from(leverage.max(1));
        let available = wallet.balance - wallet.used_margin();
        if required > available {
            info!(symbol = %symbol, %required, %available, "PAPER: insufficient margin");
            return Ok(Self::ack(OrderStatus::Rejected, Decimal::ZERO, Decimal::ZERO));
        }

        let entry = wallet
            .positions
            .entry((symbol.to_string(), position_side))
            .or_default();
        let total = entry.quantity + quantity;
        entry.entry_price = (entry.entry_price * entry.quantity + price * quantity) / total;
        entry.quantity = total;
        entry.leverage = leverage;

        info!(symbol = %symbol, side = side.to_binance_str(), %quantity, %price, "PAPER: market order filled");
        Ok(Self::ack(OrderStatus::Filled, quantity, price))
    }

    async fn close_position(&self, symbol: &str, quantity: Decimal, position_side: PositionSide) -> Result<OrderAck> {
        let price = self.market.get_mark_price(symbol).await?;
        let mut wallet = self.wallet.lock().await;
        let key = (symbol.to_string(), position_side);
        let (executed, entry_price, remaining) = match wallet.positions.get_mut(&key) {
            Some(pos) if pos.quantity > Decimal::ZERO => {
                let executed = quantity.min(pos.quantity);
                pos.quantity -= executed;
                (executed, pos.entry_price, pos.quantity)
            }
            _ => return Ok(Self::ack(OrderStatus::Rejected, Decimal::ZERO, Decimal::ZERO)),
        };
        if remaining <= Decimal::ZERO {
            wallet.positions.remove(&key);
        }

        let pnl = match position_side {
            PositionSide::Long => (price - entry_price) * executed,
            PositionSide::Short => (entry_price - price) * executed,
        };
        wallet.balance += pnl;
        info!(symbol = %symbol, %executed, %price, %pnl, "PAPER: position reduced");

        let status = if executed < quantity {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Filled
        };
        Ok(Self::ack(status, executed, price))
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        if leverage == 0 {
            return Err(anyhow!("leverage must be positive"));
        }
        self.wallet.lock().await.leverage.insert(symbol.to_string(), leverage);
        Ok(())
    }

    async fn available_balance(&self) -> Result<Decimal> {
        let wallet = self.wallet.lock().await;
        Ok((wallet.balance - wallet.used_margin()).max(Decimal::ZERO))
    }
}
