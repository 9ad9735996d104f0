// Floor-trader pivot levels projected from the last completed reference period
use super::alignment::align_from;
use super::{IndicatorCalculator, NamedSeries};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Candle, IndicatorSeries, SeriesName, TimeFrame};
use shared::utils::{start_of_utc_day, start_of_utc_month, start_of_utc_week};
use std::collections::BTreeMap;
use std::iter;

/// Calendar period whose completed bar feeds the pivot formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotPeriod {
    Day,
    Week,
    Month,
}

impl PivotPeriod {
    /// UTC start of the period containing `time`.
    pub fn period_start(&self, time: i64) -> Option<i64> {
        match self {
            PivotPeriod::Day => start_of_utc_day(time),
            PivotPeriod::Week => start_of_utc_week(time),
            PivotPeriod::Month => start_of_utc_month(time),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotLevels {
    pub pivot: f64,
    pub r1: f64,
    pub s1: f64,
    pub r2: f64,
    pub s2: f64,
    pub r3: f64,
    pub s3: f64,
}

impl PivotLevels {
    pub fn from_reference(high: f64, low: f64, close: f64) -> Self {
        let pivot = (high + low + close) / 3.0;
        let range = high - low;
        Self {
            pivot,
            r1: 2.0 * pivot - low,
            s1: 2.0 * pivot - high,
            r2: pivot + range,
            s2: pivot - range,
            r3: high + 2.0 * (pivot - low),
            s3: low - 2.0 * (high - pivot),
        }
    }

    /// Levels paired with the series they are published under.
    pub fn levels(&self) -> [(SeriesName, f64); 7] {
        [
            (SeriesName::Pivot, self.pivot),
            (SeriesName::R1, self.r1),
            (SeriesName::S1, self.s1),
            (SeriesName::R2, self.r2),
            (SeriesName::S2, self.s2),
            (SeriesName::R3, self.r3),
            (SeriesName::S3, self.s3),
        ]
    }
}

/// Collapses the candles of one period into a single bar.
fn reference_bar(candles: &[Candle]) -> Option<Candle> {
    let first = candles.first()?;
    let last = candles.last()?;
    let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    Some(Candle::new(first.time, first.open, high, low, last.close))
}

fn empty_levels() -> Vec<NamedSeries> {
    SeriesName::PIVOT_LEVELS
        .iter()
        .map(|&name| (name, IndicatorSeries::new()))
        .collect()
}

/// Pivot levels from the last completed `period`, drawn flat across the
/// candles of the period that follows it (the newest one in `data`).
///
/// Needs candles from at least two periods; otherwise all seven series are
/// empty.
pub fn compute_pivot_levels(data: &[Candle], period: PivotPeriod) -> Vec<NamedSeries> {
    let bucket = |candle: &Candle| period.period_start(candle.time);

    let Some(current_key) = data.last().and_then(bucket) else {
        return empty_levels();
    };
    let current_start = data.partition_point(|c| bucket(c).map_or(true, |k| k < current_key));
    if current_start == 0 {
        return empty_levels();
    }

    let reference_key = bucket(&data[current_start - 1]);
    let reference_start = data[..current_start].partition_point(|c| bucket(c) < reference_key);

    let Some(reference) = reference_bar(&data[reference_start..current_start]) else {
        return empty_levels();
    };

    tracing::trace!(
        ?period,
        reference_time = reference.time,
        high = reference.high,
        low = reference.low,
        close = reference.close,
        "Projecting pivot levels"
    );

    PivotLevels::from_reference(reference.high, reference.low, reference.close)
        .levels()
        .iter()
        .map(|&(name, value)| (name, align_from(data, current_start, iter::repeat(value))))
        .collect()
}

/// Pivot engine with an explicit reference period per timeframe.
pub struct PivotPoints {
    periods: BTreeMap<TimeFrame, PivotPeriod>,
}

impl PivotPoints {
    pub fn new(periods: BTreeMap<TimeFrame, PivotPeriod>) -> Self {
        Self { periods }
    }
}

impl IndicatorCalculator for PivotPoints {
    fn name(&self) -> &str {
        "PIVOT"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "periods": self.periods })
    }

    fn calculate(
        &self,
        timeframe: TimeFrame,
        data: &[Candle],
    ) -> Result<Vec<NamedSeries>, EngineError> {
        let period = self.periods.get(&timeframe).ok_or_else(|| {
            EngineError::ConfigError(format!(
                "No pivot reference period for timeframe {}",
                timeframe
            ))
        })?;
        Ok(compute_pivot_levels(data, *period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400;
    // 2024-03-11 00:00:00 UTC, a Monday
    const MONDAY: i64 = 1_710_115_200;

    fn hourly(day_start: i64, bars: &[(f64, f64, f64)]) -> Vec<Candle> {
        bars.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| {
                Candle::new(day_start + i as i64 * 3_600, close, high, low, close)
            })
            .collect()
    }

    fn level<'a>(output: &'a [NamedSeries], name: SeriesName) -> &'a IndicatorSeries {
        &output.iter().find(|(n, _)| *n == name).unwrap().1
    }

    #[test]
    fn test_reference_candle_levels() {
        let levels = PivotLevels::from_reference(110.0, 90.0, 100.0);
        assert_eq!(levels.pivot, 100.0);
        assert_eq!(levels.r1, 110.0);
        assert_eq!(levels.s1, 90.0);
        assert_eq!(levels.r2, 120.0);
        assert_eq!(levels.s2, 80.0);
        assert_eq!(levels.r3, 130.0);
        assert_eq!(levels.s3, 70.0);
    }

    #[test]
    fn test_resistance_above_support() {
        let samples = [
            (10.0, 9.0, 9.0),
            (10.0, 9.0, 10.0),
            (250.5, 1.25, 100.0),
            (1.0001, 1.0, 1.00005),
        ];
        for (high, low, close) in samples {
            let l = PivotLevels::from_reference(high, low, close);
            assert!(l.r1 > l.pivot && l.pivot > l.s1, "h={} l={} c={}", high, low, close);
        }
    }

    #[test]
    fn test_levels_from_previous_day_over_current_day() {
        let mut data = hourly(
            MONDAY,
            &[(105.0, 95.0, 100.0), (110.0, 98.0, 104.0), (108.0, 90.0, 100.0)],
        );
        let today = hourly(MONDAY + DAY, &[(101.0, 99.0, 100.0), (102.0, 100.0, 101.0)]);
        data.extend(today.iter().copied());

        let output = compute_pivot_levels(&data, PivotPeriod::Day);
        assert_eq!(output.len(), 7);

        // Monday aggregates to high 110, low 90, close 100
        let pivot = level(&output, SeriesName::Pivot);
        let times: Vec<i64> = pivot.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![today[0].time, today[1].time]);
        assert!(pivot.iter().all(|p| p.value == 100.0));
        assert!(level(&output, SeriesName::R1).iter().all(|p| p.value == 110.0));
        assert!(level(&output, SeriesName::S1).iter().all(|p| p.value == 90.0));
    }

    #[test]
    fn test_only_the_latest_completed_period_is_used() {
        let mut data = hourly(MONDAY, &[(500.0, 1.0, 250.0)]);
        data.extend(hourly(MONDAY + DAY, &[(110.0, 90.0, 100.0)]));
        data.extend(hourly(MONDAY + 2 * DAY, &[(100.0, 100.0, 100.0)]));

        let output = compute_pivot_levels(&data, PivotPeriod::Day);
        assert_eq!(level(&output, SeriesName::Pivot)[0].value, 100.0);
        assert_eq!(level(&output, SeriesName::Pivot)[0].time, MONDAY + 2 * DAY);
    }

    #[test]
    fn test_single_period_has_no_reference() {
        let data = hourly(MONDAY, &[(105.0, 95.0, 100.0), (110.0, 98.0, 104.0)]);
        let output = compute_pivot_levels(&data, PivotPeriod::Day);
        assert_eq!(output.len(), 7);
        assert!(output.iter().all(|(_, series)| series.is_empty()));
        assert!(compute_pivot_levels(&[], PivotPeriod::Week).iter().all(|(_, s)| s.is_empty()));
    }

    #[test]
    fn test_weekly_reference_on_daily_bars() {
        // Mon..Fri of one week, then Monday of the next
        let mut data: Vec<Candle> = (0..5)
            .map(|d| {
                Candle::new(MONDAY + d * DAY, 100.0, 100.0 + d as f64, 100.0 - d as f64, 100.0)
            })
            .collect();
        data.push(Candle::new(MONDAY + 7 * DAY, 100.0, 101.0, 99.0, 100.0));

        let output = compute_pivot_levels(&data, PivotPeriod::Week);
        // Week high 104, low 96, close 100
        let r2 = level(&output, SeriesName::R2);
        assert_eq!(r2.len(), 1);
        assert_eq!(r2[0].value, 108.0);
        assert_eq!(r2[0].time, MONDAY + 7 * DAY);
    }

    #[test]
    fn test_calculator_requires_configured_period() {
        let engine = PivotPoints::new(BTreeMap::from([(TimeFrame::Hour1, PivotPeriod::Day)]));
        assert!(engine.calculate(TimeFrame::Hour1, &[]).is_ok());
        let err = engine.calculate(TimeFrame::Day1, &[]).unwrap_err();
        assert!(matches!(err, EngineError::ConfigError(_)));
    }
}
