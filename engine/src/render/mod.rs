// Rendering surface seam and the in-process chart surface
pub mod registry;

pub use registry::{
    ChartSurface, RegisteredSeries, SeriesData, SeriesHandle, SeriesRegistry, SeriesStyle,
};

use shared::models::{CandleSeries, IndicatorPoint, SeriesName};

/// Receiver of published series. Every call replaces the named series
/// wholesale; there is no append.
pub trait RenderSurface {
    fn set_candles(&mut self, candles: &CandleSeries);
    fn set_data(&mut self, name: SeriesName, points: &[IndicatorPoint]);
}
