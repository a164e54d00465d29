#![allow(dead_code)]

pub mod candles;
pub mod gateways;

pub use candles::{flat_series, trend_series, utc};
pub use gateways::{CloseReply, MockMarket, MockOrders};
