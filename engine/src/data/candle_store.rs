// Holds the candle series the indicators are computed from
use shared::models::{CandleSeries, TimeFrame};
use std::sync::Arc;

/// One fetched series together with what it was fetched for.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSnapshot {
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub series: CandleSeries,
}

/// Single-slot store: at most one series, replaced wholesale.
///
/// Readers take an `Arc` snapshot, so a replacement never shows up halfway
/// through an indicator run.
#[derive(Debug, Default)]
pub struct CandleStore {
    current: Option<Arc<CandleSnapshot>>,
}

impl CandleStore {
    pub fn new() -> Self {
        CandleStore { current: None }
    }

    pub fn replace(
        &mut self,
        symbol: &str,
        timeframe: TimeFrame,
        series: CandleSeries,
    ) -> Arc<CandleSnapshot> {
        tracing::info!(
            symbol,
            %timeframe,
            candles = series.len(),
            first_time = series.first().map(|c| c.time),
            last_time = series.last().map(|c| c.time),
            "Replacing candle series"
        );
        let snapshot = Arc::new(CandleSnapshot {
            symbol: symbol.to_string(),
            timeframe,
            series,
        });
        self.current = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn snapshot(&self) -> Option<Arc<CandleSnapshot>> {
        self.current.clone()
    }

    pub fn timeframe(&self) -> Option<TimeFrame> {
        self.current.as_ref().map(|s| s.timeframe)
    }
}
