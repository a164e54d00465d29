use chrono::{DateTime, TimeZone, Utc};
use trend_bot::types::{Candle, Timeframe};

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
}

/// Linear series: close moves by `step` per bar, body of 0.3 in the direction of travel.
pub fn trend_series(n: usize, start: f64, step: f64, tf: Timeframe, first_open: DateTime<Utc>) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = start + step * i as f64;
            let open = if step >= 0.0 { close - 0.3 } else { close + 0.3 };
            Candle {
                open_time: first_open + tf.duration() * i as i32,
                open,
                high: open.max(close) + 0.1,
                low: open.min(close) - 0.1,
                close,
                volume: 1_000.0,
            }
        })
        .collect()
}

pub fn flat_series(n: usize, price: f64, tf: Timeframe, first_open: DateTime<Utc>) -> Vec<Candle> {
    (0..n)
        .map(|i| Candle {
            open_time: first_open + tf.duration() * i as i32,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1_000.0,
        })
        .collect()
}
