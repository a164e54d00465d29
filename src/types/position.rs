use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::core::PositionDirection;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TakeProfitState {
    pub r1_done: bool,
    pub r2_done: bool,
    pub r3_done: bool,
}

/// Open position as tracked by the position manager.
///
/// Values are replaced, not edited: every risk tick produces a new `Position`
/// (see `risk::track` and `risk::apply_fill`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub direction: PositionDirection,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub original_quantity: Decimal,
    pub mark_price: Decimal,
    /// Initial stop distance in price terms, fixed at entry.
    pub r_value: Decimal,
    /// Running high since entry (longs).
    pub highest_price: Decimal,
    /// Running low since entry (shorts).
    pub lowest_price: Decimal,
    pub take_profit: TakeProfitState,
    pub trailing_stop_price: Option<Decimal>,
    pub breakeven_applied: bool,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn open(
        symbol: &str,
        direction: PositionDirection,
        entry_price: Decimal,
        quantity: Decimal,
        stop_loss_pct: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Self {
        let r_value = entry_price * stop_loss_pct / Decimal::ONE_HUNDRED;
        Self {
            symbol: symbol.to_string(),
            direction,
            entry_price,
            quantity,
            original_quantity: quantity,
            mark_price: entry_price,
            r_value,
            highest_price: entry_price,
            lowest_price: entry_price,
            take_profit: TakeProfitState::default(),
            trailing_stop_price: None,
            breakeven_applied: false,
            opened_at,
        }
    }

    /// Price distance in the position's favour (negative when losing).
    pub fn favorable_move(&self, price: Decimal) -> Decimal {
        match self.direction {
            PositionDirection::Long => price - self.entry_price,
            PositionDirection::Short => self.entry_price - price,
        }
    }

    pub fn r_multiple(&self, price: Decimal) -> Decimal {
        if self.r_value.is_zero() {
            return Decimal::ZERO;
        }
        self.favorable_move(price) / self.r_value
    }

    /// Price at which the position is `multiple` R in profit.
    pub fn r_price(&self, multiple: Decimal) -> Decimal {
        match self.direction {
            PositionDirection::Long => self.entry_price + self.r_value * multiple,
            PositionDirection::Short => self.entry_price - self.r_value * multiple,
        }
    }

    /// Effective static stop: entry once breakeven was applied, otherwise entry -/+ 1R.
    pub fn stop_loss_price(&self) -> Decimal {
        if self.breakeven_applied {
            self.entry_price
        } else {
            self.r_price(-Decimal::ONE)
        }
    }

    /// Unrealised move in percent of the entry price.
    pub fn pnl_pct(&self) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        self.favorable_move(self.mark_price) / self.entry_price * Decimal::ONE_HUNDRED
    }

    /// Best price seen in the position's favour.
    pub fn best_price(&self) -> Decimal {
        match self.direction {
            PositionDirection::Long => self.highest_price,
            PositionDirection::Short => self.lowest_price,
        }
    }

    pub fn closed_quantity(&self) -> Decimal {
        self.original_quantity - self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn r_value_is_fixed_from_stop_loss_percent() {
        let pos = Position::open("BTCUSDT", PositionDirection::Long, dec!(100), dec!(2), dec!(0.5), Utc::now());
        assert_eq!(pos.r_value, dec!(0.5));
        assert_eq!(pos.r_price(Decimal::ONE), dec!(100.5));
        assert_eq!(pos.stop_loss_price(), dec!(99.5));
    }

    #[test]
    fn short_prices_mirror_long() {
        let pos = Position::open("ETHUSDT", PositionDirection::Short, dec!(200), dec!(1), dec!(1), Utc::now());
        assert_eq!(pos.r_value, dec!(2));
        assert_eq!(pos.r_price(dec!(2)), dec!(196));
        assert_eq!(pos.stop_loss_price(), dec!(202));
        assert_eq!(pos.r_multiple(dec!(197)), dec!(1.5));
    }
}
