use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::core::PositionDirection;

/// Directional entry signal produced by the detector.
///
/// Consumed once by the position manager and never mutated.
#[derive(Clone, Debug, Serialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: PositionDirection,
    pub time: DateTime<Utc>,
    pub entry_price: f64,
    /// passed filters / 4
    pub confidence: f64,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
    Rejected,
}

/// Order gateway response for a market order or a position close.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct OrderAck {
    pub order_id: String,
    pub status: OrderStatus,
    /// Quantity actually executed by this order (may be less than requested).
    pub executed_qty: Decimal,
    pub avg_price: Decimal,
}

impl OrderAck {
    /// Quantity the core may treat as executed. Anything but a (partial) fill counts as zero.
    pub fn filled_qty(&self) -> Decimal {
        match self.status {
            OrderStatus::Filled | OrderStatus::PartiallyFilled if self.executed_qty > Decimal::ZERO => {
                self.executed_qty
            }
            _ => Decimal::ZERO,
        }
    }
}
