use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown timeframe code: '{0}'")]
    UnknownTimeframe(String),

    #[error("Invalid candle at time {time}: {reason}")]
    InvalidCandle { time: i64, reason: String },
}

/// One OHLC bar. `time` is the bar's open time in seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { time, open, high, low, close }
    }

    /// Checks that every price is finite and that high/low bound the body.
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |reason: &str| ModelError::InvalidCandle {
            time: self.time,
            reason: reason.to_string(),
        };

        if ![self.open, self.high, self.low, self.close].iter().all(|p| p.is_finite()) {
            return Err(invalid("non-finite price"));
        }
        if self.high < self.open.max(self.close) {
            return Err(invalid("high is below open/close"));
        }
        if self.low > self.open.min(self.close) {
            return Err(invalid("low is above open/close"));
        }
        Ok(())
    }
}

/// Candles for one symbol/timeframe, strictly ascending by `time`.
///
/// The only way to build a non-empty series is [`CandleSeries::from_candles`],
/// so every instance upholds the ordering and length invariants.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Normalizes raw candles into a series.
    ///
    /// Candles are sorted by time; for duplicate timestamps the one received
    /// last wins. Only the most recent `max_len` candles are kept.
    pub fn from_candles(mut candles: Vec<Candle>, max_len: usize) -> Result<Self, ModelError> {
        for candle in &candles {
            candle.validate()?;
        }

        // Stable sort, so arrival order survives among equal timestamps.
        candles.sort_by_key(|c| c.time);

        let mut ordered: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match ordered.last_mut() {
                Some(last) if last.time == candle.time => *last = candle,
                _ => ordered.push(candle),
            }
        }

        if ordered.len() > max_len {
            ordered.drain(..ordered.len() - max_len);
        }

        Ok(Self { candles: ordered })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }
}

impl AsRef<[Candle]> for CandleSeries {
    fn as_ref(&self) -> &[Candle] {
        &self.candles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub time: i64,
    pub value: f64,
}

impl IndicatorPoint {
    pub fn new(time: i64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Indicator output, ascending by time; every time is taken from a candle.
pub type IndicatorSeries = Vec<IndicatorPoint>;

/// Bar durations offered by the timeframe selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeFrame {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "3m")]
    Minute3,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl TimeFrame {
    pub const ALL: [TimeFrame; 8] = [
        TimeFrame::Minute1,
        TimeFrame::Minute3,
        TimeFrame::Minute5,
        TimeFrame::Minute15,
        TimeFrame::Minute30,
        TimeFrame::Hour1,
        TimeFrame::Hour4,
        TimeFrame::Day1,
    ];

    /// Interval code as used by the exchange API ("1m", "4h", ...).
    pub fn code(&self) -> &'static str {
        match self {
            TimeFrame::Minute1 => "1m",
            TimeFrame::Minute3 => "3m",
            TimeFrame::Minute5 => "5m",
            TimeFrame::Minute15 => "15m",
            TimeFrame::Minute30 => "30m",
            TimeFrame::Hour1 => "1h",
            TimeFrame::Hour4 => "4h",
            TimeFrame::Day1 => "1d",
        }
    }

    /// Bar duration in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            TimeFrame::Minute1 => 60,
            TimeFrame::Minute3 => 3 * 60,
            TimeFrame::Minute5 => 5 * 60,
            TimeFrame::Minute15 => 15 * 60,
            TimeFrame::Minute30 => 30 * 60,
            TimeFrame::Hour1 => 60 * 60,
            TimeFrame::Hour4 => 4 * 60 * 60,
            TimeFrame::Day1 => 24 * 60 * 60,
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TimeFrame {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeFrame::ALL
            .iter()
            .copied()
            .find(|tf| tf.code() == s.trim())
            .ok_or_else(|| ModelError::UnknownTimeframe(s.to_string()))
    }
}

/// Names of the series handed to the rendering surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SeriesName {
    Candles,
    Sma,
    Ema,
    Pivot,
    R1,
    S1,
    R2,
    S2,
    R3,
    S3,
}

impl SeriesName {
    pub const ALL: [SeriesName; 10] = [
        SeriesName::Candles,
        SeriesName::Sma,
        SeriesName::Ema,
        SeriesName::Pivot,
        SeriesName::R1,
        SeriesName::S1,
        SeriesName::R2,
        SeriesName::S2,
        SeriesName::R3,
        SeriesName::S3,
    ];

    pub const PIVOT_LEVELS: [SeriesName; 7] = [
        SeriesName::Pivot,
        SeriesName::R1,
        SeriesName::S1,
        SeriesName::R2,
        SeriesName::S2,
        SeriesName::R3,
        SeriesName::S3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesName::Candles => "candles",
            SeriesName::Sma => "sma",
            SeriesName::Ema => "ema",
            SeriesName::Pivot => "pivot",
            SeriesName::R1 => "r1",
            SeriesName::S1 => "s1",
            SeriesName::R2 => "r2",
            SeriesName::S2 => "s2",
            SeriesName::R3 => "r3",
            SeriesName::S3 => "s3",
        }
    }
}

impl fmt::Display for SeriesName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
