// Exponential Moving Average (EMA) indicator implementation
use super::alignment::align_from;
use super::{IndicatorCalculator, NamedSeries};
use crate::error::EngineError;
use serde_json::Value;
use shared::models::{Candle, IndicatorSeries, SeriesName, TimeFrame};
use std::iter;
use std::num::NonZeroUsize;

/// EMA over closes, seeded with the SMA of the first `period` closes.
///
/// The seed is emitted on `data[period - 1]` and every later candle gets one
/// point, so the output lines up point-for-point with [`super::compute_sma`].
pub fn compute_ema(data: &[Candle], period: NonZeroUsize) -> IndicatorSeries {
    let period = period.get();
    if data.len() < period {
        return IndicatorSeries::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = data[..period].iter().map(|c| c.close).sum::<f64>() / period as f64;

    let smoothed = data[period..].iter().scan(seed, |previous, candle| {
        *previous = alpha * candle.close + (1.0 - alpha) * *previous;
        Some(*previous)
    });

    align_from(data, period - 1, iter::once(seed).chain(smoothed))
}

pub struct Ema {
    name: String,
    period: NonZeroUsize,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        let period = NonZeroUsize::new(period).ok_or_else(|| {
            EngineError::ConfigError("EMA period must be greater than 0".to_string())
        })?;
        Ok(Self {
            name: format!("EMA({})", period),
            period,
        })
    }
}

impl IndicatorCalculator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "period": self.period.get() })
    }

    fn calculate(
        &self,
        _timeframe: TimeFrame,
        data: &[Candle],
    ) -> Result<Vec<NamedSeries>, EngineError> {
        Ok(vec![(SeriesName::Ema, compute_ema(data, self.period))])
    }
}
