// Engine settings, loaded from a JSON file or the embedded default
use serde::Deserialize;
use shared::models::{SeriesName, TimeFrame};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::EngineError;
use crate::indicators::pivot::PivotPeriod;
use crate::render::SeriesStyle;

/// Upper bound the kline endpoint accepts for `limit`.
pub const EXCHANGE_MAX_LIMIT: usize = 1000;

const DEFAULT_CONFIG: &str = include_str!("../../assets/config/default.json");

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub symbol: String,
    pub default_timeframe: TimeFrame,
    pub api_base_url: String,
    pub max_candles: usize,
    pub fetch_limit: usize,
    pub fetch_timeout_secs: u64,
    pub sma_period: usize,
    pub ema_period: usize,
    pub pivot_periods: BTreeMap<TimeFrame, PivotPeriod>,
    pub styles: BTreeMap<SeriesName, SeriesStyle>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let pivot_periods = TimeFrame::ALL
            .iter()
            .map(|&tf| {
                let period = match tf {
                    TimeFrame::Hour4 => PivotPeriod::Week,
                    TimeFrame::Day1 => PivotPeriod::Month,
                    _ => PivotPeriod::Day,
                };
                (tf, period)
            })
            .collect();

        let line = |color: &str, line_width: u32| SeriesStyle::new(color, line_width, None);
        let level = |color: &str, name: SeriesName| {
            SeriesStyle::new(color, 1, Some(name.as_str().to_uppercase()))
        };

        let styles = BTreeMap::from([
            (SeriesName::Candles, line("#26a69a", 1)),
            (SeriesName::Sma, line("blue", 2)),
            (SeriesName::Ema, line("purple", 2)),
            (SeriesName::Pivot, level("red", SeriesName::Pivot)),
            (SeriesName::R1, level("green", SeriesName::R1)),
            (SeriesName::S1, level("blue", SeriesName::S1)),
            (SeriesName::R2, level("purple", SeriesName::R2)),
            (SeriesName::S2, level("orange", SeriesName::S2)),
            (SeriesName::R3, level("grey", SeriesName::R3)),
            (SeriesName::S3, level("brown", SeriesName::S3)),
        ]);

        EngineSettings {
            symbol: "BTCUSDT".to_string(),
            default_timeframe: TimeFrame::Day1,
            api_base_url: "https://api.binance.com".to_string(),
            max_candles: EXCHANGE_MAX_LIMIT,
            fetch_limit: EXCHANGE_MAX_LIMIT,
            fetch_timeout_secs: 10,
            sma_period: 14,
            ema_period: 36,
            pivot_periods,
            styles,
        }
    }
}

impl EngineSettings {
    /// Parses and validates the configuration bundled with the binary.
    pub fn load_default() -> Result<Self, EngineError> {
        Self::from_json(DEFAULT_CONFIG)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses `raw` on top of the defaults. Entries in `styles` are merged
    /// per series, so a file may restyle only some of them.
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let mut settings: EngineSettings = serde_json::from_str(raw)
            .map_err(|e| EngineError::ConfigError(format!("Invalid settings JSON: {}", e)))?;
        for (name, style) in EngineSettings::default().styles {
            settings.styles.entry(name).or_insert(style);
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.symbol.trim().is_empty() {
            return Err(EngineError::ConfigError("symbol must not be empty".to_string()));
        }
        if self.sma_period == 0 {
            return Err(EngineError::ConfigError("sma_period must be at least 1".to_string()));
        }
        if self.ema_period == 0 {
            return Err(EngineError::ConfigError("ema_period must be at least 1".to_string()));
        }
        if self.max_candles == 0 || self.max_candles > EXCHANGE_MAX_LIMIT {
            return Err(EngineError::ConfigError(format!(
                "max_candles must be between 1 and {}, got {}",
                EXCHANGE_MAX_LIMIT, self.max_candles
            )));
        }
        if self.fetch_limit == 0 || self.fetch_limit > self.max_candles {
            return Err(EngineError::ConfigError(format!(
                "fetch_limit must be between 1 and max_candles ({}), got {}",
                self.max_candles, self.fetch_limit
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(EngineError::ConfigError("fetch_timeout_secs must be positive".to_string()));
        }
        if let Some(missing) = TimeFrame::ALL
            .iter()
            .find(|tf| !self.pivot_periods.contains_key(tf))
        {
            return Err(EngineError::ConfigError(format!(
                "pivot_periods has no reference period for timeframe {}",
                missing
            )));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn style_for(&self, name: SeriesName) -> SeriesStyle {
        self.styles.get(&name).cloned().unwrap_or_default()
    }
}
