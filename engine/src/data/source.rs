// Market data retrieval seam
use async_trait::async_trait;
use shared::models::{Candle, TimeFrame};

use crate::config::EngineSettings;
use crate::error::EngineError;

/// Request for the `limit` most recent candles of a symbol/timeframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineRequest {
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub limit: usize,
}

impl KlineRequest {
    pub fn from_settings(settings: &EngineSettings, timeframe: TimeFrame) -> Self {
        Self {
            symbol: settings.symbol.to_uppercase(),
            timeframe,
            limit: settings.fetch_limit,
        }
    }
}

/// Anything that can answer a [`KlineRequest`].
///
/// Implementations return candles in whatever order the upstream delivers;
/// the pipeline normalizes them into a `CandleSeries`.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_candles(&self, request: &KlineRequest) -> Result<Vec<Candle>, EngineError>;
}
