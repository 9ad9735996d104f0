//! Decoding of exchange kline tuples.
//!
//! A kline arrives as a JSON array `[openTime, open, high, low, close, ...]`
//! with the open time in milliseconds and prices as numeric strings. Only
//! the first five fields are used.

use serde_json::Value;
use shared::models::Candle;
use shared::utils::millis_to_secs;

use crate::error::EngineError;

const PRICE_FIELDS: [&str; 4] = ["open", "high", "low", "close"];

/// Decodes a kline response body into candles, in payload order.
pub fn decode_klines(body: &str) -> Result<Vec<Candle>, EngineError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            kline_to_candle(row)
                .map_err(|e| EngineError::MalformedKline(format!("row {}: {}", idx, e)))
        })
        .collect()
}

/// Converts one kline tuple into a candle.
pub fn kline_to_candle(row: &[Value]) -> Result<Candle, String> {
    if row.len() < 5 {
        return Err(format!("expected at least 5 fields, got {}", row.len()));
    }

    let open_time_ms = match &row[0] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("invalid open time {}", row[0]))?;

    let mut prices = [0.0; 4];
    for (slot, (value, name)) in prices.iter_mut().zip(row[1..5].iter().zip(PRICE_FIELDS)) {
        *slot = parse_price(value).ok_or_else(|| format!("invalid {} price {}", name, value))?;
    }
    let [open, high, low, close] = prices;

    Ok(Candle::new(millis_to_secs(open_time_ms), open, high, low, close))
}

fn parse_price(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
