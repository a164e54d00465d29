pub mod core;
pub mod events;
pub mod position;

pub use self::core::{Candle, PositionDirection, PositionSide, Side, SymbolRules, Timeframe, TrendDirection};
pub use events::{OrderAck, OrderStatus, Signal};
pub use position::{Position, TakeProfitState};
