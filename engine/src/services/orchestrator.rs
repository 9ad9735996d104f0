// Recomputes and publishes indicators whenever a fetch replaces the candles
use shared::models::{Candle, CandleSeries, SeriesName, TimeFrame};
use std::fmt;

use crate::config::EngineSettings;
use crate::data::{CandleStore, KlineRequest};
use crate::error::EngineError;
use crate::indicators::alignment::check_alignment;
use crate::indicators::{Ema, IndicatorCalculator, PivotPoints, Sma};
use crate::render::RenderSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Computing,
    Published,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineState::Idle => "idle",
            PipelineState::Fetching => "fetching",
            PipelineState::Computing => "computing",
            PipelineState::Published => "published",
        };
        f.write_str(label)
    }
}

/// Issued for every timeframe selection; a completion is only applied if its
/// ticket is the newest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub request: KlineRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Published {
        timeframe: TimeFrame,
        candles: usize,
        series: Vec<SeriesName>,
        /// Indicators or series that could not be published this round.
        failed: Vec<String>,
    },
    Failed {
        timeframe: TimeFrame,
        reason: String,
    },
    Discarded {
        generation: u64,
        current: u64,
    },
}

pub struct IndicatorOrchestrator<S: RenderSurface> {
    settings: EngineSettings,
    store: CandleStore,
    surface: S,
    engines: Vec<Box<dyn IndicatorCalculator>>,
    state: PipelineState,
    generation: u64,
    in_flight: Option<u64>,
}

impl<S: RenderSurface> IndicatorOrchestrator<S> {
    /// Builds the SMA, EMA and pivot engines from `settings`.
    pub fn new(settings: EngineSettings, surface: S) -> Result<Self, EngineError> {
        settings.validate()?;
        let engines: Vec<Box<dyn IndicatorCalculator>> = vec![
            Box::new(Sma::new(settings.sma_period)?),
            Box::new(Ema::new(settings.ema_period)?),
            Box::new(PivotPoints::new(settings.pivot_periods.clone())),
        ];
        Ok(Self::with_engines(settings, surface, engines))
    }

    pub fn with_engines(
        settings: EngineSettings,
        surface: S,
        engines: Vec<Box<dyn IndicatorCalculator>>,
    ) -> Self {
        for engine in &engines {
            tracing::debug!(
                indicator = engine.name(),
                parameters = %engine.parameters(),
                "Indicator registered"
            );
        }
        Self {
            settings,
            store: CandleStore::new(),
            surface,
            engines,
            state: PipelineState::Idle,
            generation: 0,
            in_flight: None,
        }
    }

    /// Starts a new selection. Any fetch still out for an older selection
    /// becomes stale.
    pub fn select_timeframe(&mut self, timeframe: TimeFrame) -> FetchTicket {
        self.generation += 1;
        if let Some(stale) = self.in_flight.replace(self.generation) {
            tracing::debug!(stale_generation = stale, "Superseding in-flight fetch");
        }
        self.transition(PipelineState::Fetching);

        let request = KlineRequest::from_settings(&self.settings, timeframe);
        tracing::info!(
            symbol = %request.symbol,
            %timeframe,
            generation = self.generation,
            "Timeframe selected"
        );
        FetchTicket {
            generation: self.generation,
            request,
        }
    }

    /// Applies a fetch result. Stale tickets are discarded, failures keep the
    /// last published series on the surface.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<Candle>, EngineError>,
    ) -> FetchOutcome {
        if self.in_flight != Some(ticket.generation) {
            tracing::info!(
                generation = ticket.generation,
                current = self.generation,
                timeframe = %ticket.request.timeframe,
                "Discarding stale fetch result"
            );
            return FetchOutcome::Discarded {
                generation: ticket.generation,
                current: self.generation,
            };
        }
        self.in_flight = None;

        let timeframe = ticket.request.timeframe;
        let series = result.and_then(|candles| {
            CandleSeries::from_candles(candles, self.settings.max_candles)
                .map_err(EngineError::from)
        });

        let series = match series {
            Ok(series) => series,
            Err(err) => {
                if err.is_fetch_failure() {
                    tracing::warn!(
                        %timeframe,
                        error = %err,
                        "Fetch failed, keeping previous series"
                    );
                } else {
                    tracing::error!(
                        %timeframe,
                        error = %err,
                        "Fetch failed with a non-recoverable error"
                    );
                }
                let fallback = if self.store.snapshot().is_some() {
                    PipelineState::Published
                } else {
                    PipelineState::Idle
                };
                self.transition(fallback);
                return FetchOutcome::Failed {
                    timeframe,
                    reason: err.to_string(),
                };
            }
        };

        self.store.replace(&ticket.request.symbol, timeframe, series);
        self.transition(PipelineState::Computing);
        self.publish()
    }

    /// Runs every engine against the stored series and hands the results to
    /// the surface. A failing engine or misaligned series is skipped.
    fn publish(&mut self) -> FetchOutcome {
        let Some(snapshot) = self.store.snapshot() else {
            self.transition(PipelineState::Idle);
            return FetchOutcome::Failed {
                timeframe: self.settings.default_timeframe,
                reason: "no candle series to publish".to_string(),
            };
        };
        let candles = snapshot.series.as_slice();

        self.surface.set_candles(&snapshot.series);
        let mut published = vec![SeriesName::Candles];
        let mut failed = Vec::new();

        for engine in &self.engines {
            let outputs = match engine.calculate(snapshot.timeframe, candles) {
                Ok(outputs) => outputs,
                Err(err) => {
                    tracing::error!(
                        indicator = engine.name(),
                        error = %err,
                        "Indicator failed, publishing the rest"
                    );
                    failed.push(engine.name().to_string());
                    continue;
                }
            };

            for (name, series) in outputs {
                if let Err(err) = check_alignment(candles, name, &series) {
                    tracing::error!(
                        indicator = engine.name(),
                        error = %err,
                        "Refusing to publish misaligned series"
                    );
                    failed.push(name.to_string());
                    continue;
                }
                tracing::debug!(series = %name, points = series.len(), "Publishing series");
                self.surface.set_data(name, &series);
                published.push(name);
            }
        }

        self.transition(PipelineState::Published);
        tracing::info!(
            symbol = %snapshot.symbol,
            timeframe = %snapshot.timeframe,
            candles = candles.len(),
            series = published.len(),
            failed = failed.len(),
            "Indicators published"
        );

        FetchOutcome::Published {
            timeframe: snapshot.timeframe,
            candles: candles.len(),
            series: published,
            failed,
        }
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::trace!(from = %self.state, to = %next, "Pipeline state change");
        self.state = next;
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::NamedSeries;
    use crate::render::ChartSurface;
    use serde_json::Value;
    use shared::models::IndicatorPoint;

    const HOUR: i64 = 3_600;
    // 2024-03-11 00:00:00 UTC
    const MONDAY: i64 = 1_710_115_200;

    fn hourly_candles(count: i64, base: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let close = base + i as f64;
                Candle::new(MONDAY + i * HOUR, close, close + 1.0, close - 1.0, close)
            })
            .collect()
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            sma_period: 3,
            ema_period: 3,
            ..EngineSettings::default()
        }
    }

    fn orchestrator() -> IndicatorOrchestrator<ChartSurface> {
        let settings = settings();
        let surface = ChartSurface::mount(&settings);
        IndicatorOrchestrator::new(settings, surface).unwrap()
    }

    struct Broken;

    impl IndicatorCalculator for Broken {
        fn name(&self) -> &str {
            "BROKEN"
        }

        fn parameters(&self) -> Value {
            Value::Null
        }

        fn calculate(&self, _: TimeFrame, _: &[Candle]) -> Result<Vec<NamedSeries>, EngineError> {
            Err(EngineError::ConfigError("broken on purpose".to_string()))
        }
    }

    struct Drifting;

    impl IndicatorCalculator for Drifting {
        fn name(&self) -> &str {
            "DRIFT"
        }

        fn parameters(&self) -> Value {
            Value::Null
        }

        fn calculate(
            &self,
            _: TimeFrame,
            data: &[Candle],
        ) -> Result<Vec<NamedSeries>, EngineError> {
            // Times estimated from index and duration instead of copied
            let series = data.iter().map(|c| IndicatorPoint::new(c.time + 1, c.close)).collect();
            Ok(vec![(SeriesName::Ema, series)])
        }
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut orch = orchestrator();
        assert_eq!(orch.state(), PipelineState::Idle);

        let ticket = orch.select_timeframe(TimeFrame::Hour1);
        assert_eq!(orch.state(), PipelineState::Fetching);
        assert_eq!(ticket.request.timeframe, TimeFrame::Hour1);
        assert_eq!(ticket.request.symbol, "BTCUSDT");
        assert_eq!(ticket.request.limit, 1000);

        let outcome = orch.complete_fetch(&ticket, Ok(hourly_candles(30, 100.0)));
        assert_eq!(orch.state(), PipelineState::Published);
        match outcome {
            FetchOutcome::Published { timeframe, candles, series, failed } => {
                assert_eq!(timeframe, TimeFrame::Hour1);
                assert_eq!(candles, 30);
                assert_eq!(series.len(), SeriesName::ALL.len());
                assert!(failed.is_empty());
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let surface = orch.surface();
        assert_eq!(surface.candles().unwrap().len(), 30);
        let sma = surface.points(SeriesName::Sma).unwrap();
        let ema = surface.points(SeriesName::Ema).unwrap();
        assert_eq!(sma.len(), 28);
        assert_eq!(ema.len(), 28);
        assert_eq!(sma[0].time, MONDAY + 2 * HOUR);
        assert_eq!(ema[0].time, sma[0].time);
    }

    #[test]
    fn test_single_day_has_no_pivots() {
        let mut orch = orchestrator();
        let ticket = orch.select_timeframe(TimeFrame::Hour1);
        orch.complete_fetch(&ticket, Ok(hourly_candles(6, 100.0)));
        assert!(orch.surface().points(SeriesName::Pivot).unwrap().is_empty());
        assert!(orch.surface().points(SeriesName::S3).unwrap().is_empty());
    }

    #[test]
    fn test_pivots_published_after_day_rollover() {
        let mut orch = orchestrator();
        let ticket = orch.select_timeframe(TimeFrame::Hour1);
        orch.complete_fetch(&ticket, Ok(hourly_candles(30, 100.0)));

        // 24 Monday bars + 6 Tuesday bars; Tuesday carries the levels
        let pivot = orch.surface().points(SeriesName::Pivot).unwrap();
        assert_eq!(pivot.len(), 6);
        assert_eq!(pivot[0].time, MONDAY + 24 * HOUR);
        // Monday: high 124, low 99, close 123
        let expected = (124.0 + 99.0 + 123.0) / 3.0;
        assert!(pivot.iter().all(|p| p.value == expected));
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut orch = orchestrator();
        let ticket_a = orch.select_timeframe(TimeFrame::Minute5);
        let ticket_b = orch.select_timeframe(TimeFrame::Hour1);

        let outcome_b = orch.complete_fetch(&ticket_b, Ok(hourly_candles(10, 200.0)));
        assert!(matches!(outcome_b, FetchOutcome::Published { timeframe: TimeFrame::Hour1, .. }));

        let outcome_a = orch.complete_fetch(&ticket_a, Ok(hourly_candles(20, 1.0)));
        assert_eq!(outcome_a, FetchOutcome::Discarded { generation: 1, current: 2 });

        assert_eq!(orch.store().timeframe(), Some(TimeFrame::Hour1));
        assert_eq!(orch.surface().candles().unwrap().len(), 10);
        assert_eq!(orch.surface().candles().unwrap().first().unwrap().close, 200.0);
    }

    #[test]
    fn test_stale_response_before_newer_one_is_discarded() {
        let mut orch = orchestrator();
        let ticket_a = orch.select_timeframe(TimeFrame::Minute5);
        let ticket_b = orch.select_timeframe(TimeFrame::Hour1);

        let outcome_a = orch.complete_fetch(&ticket_a, Ok(hourly_candles(20, 1.0)));
        assert!(matches!(outcome_a, FetchOutcome::Discarded { .. }));
        assert_eq!(orch.state(), PipelineState::Fetching);
        assert!(orch.surface().candles().unwrap().is_empty());

        orch.complete_fetch(&ticket_b, Ok(hourly_candles(10, 200.0)));
        assert_eq!(orch.surface().candles().unwrap().len(), 10);
    }

    #[test]
    fn test_duplicate_completion_is_discarded() {
        let mut orch = orchestrator();
        let ticket = orch.select_timeframe(TimeFrame::Hour1);
        orch.complete_fetch(&ticket, Ok(hourly_candles(5, 10.0)));
        let again = orch.complete_fetch(&ticket, Ok(hourly_candles(8, 10.0)));
        assert!(matches!(again, FetchOutcome::Discarded { .. }));
        assert_eq!(orch.surface().candles().unwrap().len(), 5);
    }

    #[test]
    fn test_failed_fetch_keeps_published_series() {
        let mut orch = orchestrator();
        let ticket = orch.select_timeframe(TimeFrame::Hour1);
        orch.complete_fetch(&ticket, Ok(hourly_candles(10, 50.0)));
        let sma_before = orch.surface().points(SeriesName::Sma).unwrap().to_vec();

        let ticket = orch.select_timeframe(TimeFrame::Day1);
        let outcome = orch.complete_fetch(&ticket, Err(EngineError::FetchTimeout(10)));

        assert!(matches!(outcome, FetchOutcome::Failed { timeframe: TimeFrame::Day1, .. }));
        assert_eq!(orch.state(), PipelineState::Published);
        assert_eq!(orch.store().timeframe(), Some(TimeFrame::Hour1));
        assert_eq!(orch.surface().points(SeriesName::Sma).unwrap(), sma_before.as_slice());
    }

    #[test]
    fn test_failed_first_fetch_returns_to_idle() {
        let mut orch = orchestrator();
        let ticket = orch.select_timeframe(TimeFrame::Hour1);
        let err = EngineError::MalformedKline("row 0".into());
        let outcome = orch.complete_fetch(&ticket, Err(err));
        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
        assert_eq!(orch.state(), PipelineState::Idle);
    }

    #[test]
    fn test_invalid_candle_is_a_failed_fetch() {
        let mut orch = orchestrator();
        let ticket = orch.select_timeframe(TimeFrame::Hour1);
        let bad = vec![Candle::new(MONDAY, 10.0, 5.0, 1.0, 10.0)];
        let outcome = orch.complete_fetch(&ticket, Ok(bad));
        assert!(matches!(
            outcome,
            FetchOutcome::Failed { ref reason, .. } if reason.contains("Invalid candle")
        ));
    }

    #[test]
    fn test_empty_series_publishes_empty_indicators() {
        let mut orch = orchestrator();
        let ticket = orch.select_timeframe(TimeFrame::Hour1);
        let outcome = orch.complete_fetch(&ticket, Ok(Vec::new()));
        assert!(matches!(outcome, FetchOutcome::Published { candles: 0, .. }));
        for name in SeriesName::ALL.iter().skip(1) {
            assert!(orch.surface().points(*name).unwrap().is_empty());
        }
    }

    #[test]
    fn test_failing_engine_does_not_block_others() {
        let settings = settings();
        let surface = ChartSurface::mount(&settings);
        let engines: Vec<Box<dyn IndicatorCalculator>> = vec![
            Box::new(Broken),
            Box::new(Sma::new(2).unwrap()),
            Box::new(Drifting),
        ];
        let mut orch = IndicatorOrchestrator::with_engines(settings, surface, engines);

        let ticket = orch.select_timeframe(TimeFrame::Hour1);
        let outcome = orch.complete_fetch(&ticket, Ok(hourly_candles(4, 1.0)));

        match outcome {
            FetchOutcome::Published { series, failed, .. } => {
                assert_eq!(series, vec![SeriesName::Candles, SeriesName::Sma]);
                assert_eq!(failed, vec!["BROKEN".to_string(), "ema".to_string()]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(orch.surface().points(SeriesName::Sma).unwrap().len(), 3);
        assert!(orch.surface().points(SeriesName::Ema).unwrap().is_empty());
    }

    #[test]
    fn test_zero_period_is_rejected_at_construction() {
        let settings = EngineSettings { sma_period: 0, ..EngineSettings::default() };
        let surface = ChartSurface::mount(&settings);
        assert!(matches!(
            IndicatorOrchestrator::new(settings, surface),
            Err(EngineError::ConfigError(_))
        ));
    }
}
