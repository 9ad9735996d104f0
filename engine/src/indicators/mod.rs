// Technical indicators module
pub mod alignment;
pub mod ema;
pub mod pivot;
pub mod sma;

pub use ema::{compute_ema, Ema};
pub use pivot::{compute_pivot_levels, PivotLevels, PivotPeriod, PivotPoints};
pub use sma::{compute_sma, Sma};

use crate::error::EngineError;
use serde_json::Value;
use shared::models::{Candle, IndicatorSeries, SeriesName, TimeFrame};

/// Named output of one indicator run, ready for the rendering surface.
pub type NamedSeries = (SeriesName, IndicatorSeries);

// Common trait for all indicators
pub trait IndicatorCalculator: Send + Sync {
    fn name(&self) -> &str;
    fn parameters(&self) -> Value; // Parameters used for this indicator instance

    /// Computes every series this indicator publishes. Insufficient history
    /// yields empty series, never an error.
    fn calculate(
        &self,
        timeframe: TimeFrame,
        data: &[Candle],
    ) -> Result<Vec<NamedSeries>, EngineError>;
}
