// Binance REST kline source
use async_trait::async_trait;
use reqwest::Client;
use shared::models::Candle;
use std::time::Duration;

use super::kline::decode_klines;
use super::source::{KlineRequest, MarketDataSource};
use crate::config::EngineSettings;
use crate::error::EngineError;

/// Fetches candles from the public `/api/v3/klines` endpoint.
#[derive(Debug, Clone)]
pub struct BinanceKlineSource {
    http: Client,
    base_url: String,
}

impl BinanceKlineSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("candle-overlay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &EngineSettings) -> Result<Self, EngineError> {
        Self::new(&settings.api_base_url, settings.fetch_timeout())
    }

    fn klines_url(&self) -> String {
        format!("{}/api/v3/klines", self.base_url)
    }
}

#[async_trait]
impl MarketDataSource for BinanceKlineSource {
    async fn fetch_candles(&self, request: &KlineRequest) -> Result<Vec<Candle>, EngineError> {
        tracing::debug!(
            symbol = %request.symbol,
            timeframe = %request.timeframe,
            limit = request.limit,
            "Requesting klines"
        );

        let limit = request.limit.to_string();
        let response = self
            .http
            .get(self.klines_url())
            .query(&[
                ("symbol", request.symbol.as_str()),
                ("interval", request.timeframe.code()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EngineError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let candles = decode_klines(&body)?;
        tracing::debug!(
            symbol = %request.symbol,
            timeframe = %request.timeframe,
            count = candles.len(),
            "Received klines"
        );
        Ok(candles)
    }
}
