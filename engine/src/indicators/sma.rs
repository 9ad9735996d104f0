// Simple Moving Average (SMA) indicator implementation
use super::alignment::align_from;
use super::{IndicatorCalculator, NamedSeries};
use crate::error::EngineError;
use serde_json::Value;
use shared::models::{Candle, IndicatorSeries, SeriesName, TimeFrame};
use std::num::NonZeroUsize;

/// Mean close over each full trailing window of `period` candles.
///
/// The first point sits on `data[period - 1]`; a series shorter than the
/// period produces no points.
pub fn compute_sma(data: &[Candle], period: NonZeroUsize) -> IndicatorSeries {
    let period = period.get();
    let means = data
        .windows(period)
        .map(|window| window.iter().map(|c| c.close).sum::<f64>() / period as f64);
    align_from(data, period - 1, means)
}

pub struct Sma {
    name: String,
    period: NonZeroUsize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, EngineError> {
        let period = NonZeroUsize::new(period).ok_or_else(|| {
            EngineError::ConfigError("SMA period must be greater than 0".to_string())
        })?;
        Ok(Self {
            name: format!("SMA({})", period),
            period,
        })
    }
}

impl IndicatorCalculator for Sma {
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
        Ok(vec![(SeriesName::Sma, compute_sma(data, self.period))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::IndicatorPoint;

    fn create_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle::new(1_000 + i as i64 * 60, close, close, close, close))
            .collect()
    }

    fn period(p: usize) -> NonZeroUsize {
        NonZeroUsize::new(p).unwrap()
    }

    #[test]
    fn test_sma_calculation() {
        let candles = create_candles(&[10.0, 20.0, 30.0]);
        let results = compute_sma(&candles, period(2));
        assert_eq!(
            results,
            vec![IndicatorPoint::new(1_060, 15.0), IndicatorPoint::new(1_120, 25.0)]
        );
    }

    #[test]
    fn test_sma_output_length() {
        for n in 0..12usize {
            let closes: Vec<f64> = (0..n).map(|i| i as f64).collect();
            let candles = create_candles(&closes);
            for p in 1..=8 {
                let expected = (n + 1).saturating_sub(p);
                assert_eq!(compute_sma(&candles, period(p)).len(), expected, "n={} p={}", n, p);
            }
        }
    }

    #[test]
    fn test_sma_window_mean() {
        let closes = [3.0, 8.0, 1.0, 9.0, 4.0, 7.0, 2.0];
        let candles = create_candles(&closes);
        let p = 3;
        let results = compute_sma(&candles, period(p));
        for (k, point) in results.iter().enumerate() {
            let i = k + p - 1;
            let expected = closes[i + 1 - p..=i].iter().sum::<f64>() / p as f64;
            assert!((point.value - expected).abs() < 1e-12, "Mismatch at index {}", i);
            assert_eq!(point.time, candles[i].time);
        }
        assert_eq!(results[0].time, candles[p - 1].time);
    }

    #[test]
    fn test_sma_insufficient_data() {
        let candles = create_candles(&[1.0, 2.0]);
        assert!(compute_sma(&candles, period(5)).is_empty());
    }

    #[test]
    fn test_sma_period_one() {
        let candles = create_candles(&[1.0, 2.0, 3.0]);
        let values: Vec<f64> = compute_sma(&candles, period(1)).iter().map(|p| p.value).collect();
        // SMA(1) is just the close price
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sma_empty_data() {
        assert!(compute_sma(&[], period(3)).is_empty());
    }

    #[test]
    fn test_sma_is_idempotent() {
        let candles = create_candles(&[1.1, 2.7, 3.3, 0.9, 5.5]);
        assert_eq!(compute_sma(&candles, period(2)), compute_sma(&candles, period(2)));
    }

    #[test]
    fn test_sma_period_zero_is_config_error() {
        assert!(matches!(Sma::new(0), Err(EngineError::ConfigError(_))));
    }

    #[test]
    fn test_sma_calculator_publishes_sma_series() {
        let sma = Sma::new(2).unwrap();
        assert_eq!(sma.name(), "SMA(2)");
        assert_eq!(sma.parameters(), serde_json::json!({ "period": 2 }));
        let output = sma.calculate(TimeFrame::Hour1, &create_candles(&[1.0, 3.0])).unwrap();
        assert_eq!(output, vec![(SeriesName::Sma, vec![IndicatorPoint::new(1_060, 2.0)])]);
    }
}
