// ORDERING: turns position-manager intents into gateway calls
// Never assumes success: an error or an empty fill comes back as NotExecuted

use crate::connection::OrderGateway;
use crate::types::{OrderAck, PositionDirection};
use rust_decimal::Decimal;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum OrderIntent {
    Open {
        symbol: String,
        direction: PositionDirection,
        quantity: Decimal,
    },
    Close {
        symbol: String,
        direction: PositionDirection,
        quantity: Decimal,
        reason: String,
    },
}

impl OrderIntent {
    pub fn symbol(&self) -> &str {
        match self {
            OrderIntent::Open { symbol, .. } | OrderIntent::Close { symbol, .. } => symbol,
        }
    }
}

impl fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderIntent::Open { symbol, direction, quantity } => {
                write!(f, "open {} {} qty {}", direction, symbol, quantity)
            }
            OrderIntent::Close {
                symbol,
                direction,
                quantity,
                reason,
            } => write!(f, "close {} {} qty {} ({})", direction, symbol, quantity, reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntentResult {
    /// Gateway confirmed a non-zero executed quantity
    Executed(OrderAck),
    NotExecuted(String),
}

impl IntentResult {
    pub fn executed_qty(&self) -> Decimal {
        match self {
            IntentResult::Executed(ack) => ack.filled_qty(),
            IntentResult::NotExecuted(_) => Decimal::ZERO,
        }
    }
}

pub async fn execute(gateway: &dyn OrderGateway, intent: &OrderIntent) -> IntentResult {
    let result = match intent {
        OrderIntent::Open {
            symbol,
            direction,
            quantity,
        } => {
            gateway
                .place_market_order(symbol, direction.entry_side(), *quantity, direction.position_side())
                .await
        }
        OrderIntent::Close {
            symbol,
            direction,
            quantity,
            ..
        } => gateway.close_position(symbol, *quantity, direction.position_side()).await,
    };

    match result {
        Ok(ack) if ack.filled_qty() > Decimal::ZERO => {
            info!(
                symbol = %intent.symbol(),
                order_id = %ack.order_id,
                executed = %ack.executed_qty,
                avg_price = %ack.avg_price,
                "ORDERING: {}",
                intent
            );
            IntentResult::Executed(ack)
        }
        Ok(ack) => {
            warn!(symbol = %intent.symbol(), status = ?ack.status, "ORDERING: {} not executed", intent);
            IntentResult::NotExecuted(format!("order {} returned {:?} without fill", ack.order_id, ack.status))
        }
        Err(e) => {
            warn!(symbol = %intent.symbol(), error = %e, "ORDERING: {} failed", intent);
            IntentResult::NotExecuted(e.to_string())
        }
    }
}
