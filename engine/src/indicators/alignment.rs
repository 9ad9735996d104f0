//! Timestamp bookkeeping shared by all indicator engines.
//!
//! Windowed and recursive indicators produce fewer points than their input.
//! Each output value is stamped with the `time` of the candle it was computed
//! at, copied as-is, so indicator lines overlay the candles on a shared axis.

use crate::error::EngineError;
use shared::models::{Candle, IndicatorPoint, IndicatorSeries, SeriesName};

/// Pairs `values` with the candles starting at index `offset`.
///
/// Extra values past the end of `candles` are dropped; an `offset` beyond the
/// end yields an empty series.
pub fn align_from<I>(candles: &[Candle], offset: usize, values: I) -> IndicatorSeries
where
    I: IntoIterator<Item = f64>,
{
    candles
        .get(offset..)
        .unwrap_or_default()
        .iter()
        .zip(values)
        .map(|(candle, value)| IndicatorPoint::new(candle.time, value))
        .collect()
}

/// Verifies that `series` is strictly ascending and that every point's time
/// belongs to a candle in `candles`.
pub fn check_alignment(
    candles: &[Candle],
    name: SeriesName,
    series: &[IndicatorPoint],
) -> Result<(), EngineError> {
    let misaligned = |reason: String| EngineError::AlignmentError {
        series: name.to_string(),
        reason,
    };

    let mut previous: Option<i64> = None;
    for point in series {
        if let Some(prev) = previous {
            if point.time <= prev {
                return Err(misaligned(format!(
                    "time {} does not follow {}",
                    point.time, prev
                )));
            }
        }
        if candles.binary_search_by_key(&point.time, |c| c.time).is_err() {
            return Err(misaligned(format!("time {} matches no candle", point.time)));
        }
        previous = Some(point.time);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(times: &[i64]) -> Vec<Candle> {
        times.iter().map(|&t| Candle::new(t, 1.0, 1.0, 1.0, 1.0)).collect()
    }

    #[test]
    fn test_align_from_copies_candle_times() {
        let data = candles(&[60, 120, 180, 240]);
        let series = align_from(&data, 2, vec![7.0, 8.0]);
        assert_eq!(series, vec![IndicatorPoint::new(180, 7.0), IndicatorPoint::new(240, 8.0)]);
    }

    #[test]
    fn test_align_from_offset_past_end() {
        let data = candles(&[60, 120]);
        assert!(align_from(&data, 5, vec![1.0]).is_empty());
    }

    #[test]
    fn test_check_alignment_accepts_subset() {
        let data = candles(&[60, 120, 180]);
        let series = vec![IndicatorPoint::new(120, 1.0), IndicatorPoint::new(180, 2.0)];
        assert!(check_alignment(&data, SeriesName::Sma, &series).is_ok());
        assert!(check_alignment(&data, SeriesName::Sma, &[]).is_ok());
    }

    #[test]
    fn test_check_alignment_rejects_foreign_time() {
        let data = candles(&[60, 120, 180]);
        // An index-times-duration estimate that drifted off the candle grid
        let series = vec![IndicatorPoint::new(150, 1.0)];
        let err = check_alignment(&data, SeriesName::Ema, &series).unwrap_err();
        assert!(matches!(err, EngineError::AlignmentError { ref series, .. } if series == "ema"));
    }

    #[test]
    fn test_check_alignment_rejects_unordered() {
        let data = candles(&[60, 120, 180]);
        let series = vec![IndicatorPoint::new(180, 1.0), IndicatorPoint::new(120, 2.0)];
        assert!(check_alignment(&data, SeriesName::Sma, &series).is_err());
    }
}
