//! Series handles owned by a chart surface.
//!
//! A [`SeriesRegistry`] is created when a surface mounts, registers one handle
//! per [`SeriesName`], and goes away with the surface. Nothing outside the
//! surface holds a handle across renders.

use serde::{Deserialize, Serialize};
use shared::models::{CandleSeries, IndicatorPoint, IndicatorSeries, SeriesName};
use std::collections::BTreeMap;

use super::RenderSurface;
use crate::config::EngineSettings;
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStyle {
    pub color: String,
    pub line_width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SeriesStyle {
    pub fn new(color: &str, line_width: u32, title: Option<String>) -> Self {
        Self {
            color: color.to_string(),
            line_width,
            title,
        }
    }
}

impl Default for SeriesStyle {
    fn default() -> Self {
        Self::new("black", 1, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesHandle(usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesData {
    Candles(CandleSeries),
    Line(IndicatorSeries),
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredSeries {
    pub name: SeriesName,
    pub style: SeriesStyle,
    /// Number of wholesale replacements since mount.
    pub revision: u64,
    pub data: SeriesData,
}

#[derive(Debug, Default)]
pub struct SeriesRegistry {
    handles: BTreeMap<SeriesName, SeriesHandle>,
    series: Vec<RegisteredSeries>,
}

impl SeriesRegistry {
    /// Registers every series name with its style and no data.
    pub fn mount(style_for: impl Fn(SeriesName) -> SeriesStyle) -> Self {
        let mut registry = SeriesRegistry::default();
        for name in SeriesName::ALL {
            let data = match name {
                SeriesName::Candles => SeriesData::Candles(CandleSeries::empty()),
                _ => SeriesData::Line(IndicatorSeries::new()),
            };
            registry.handles.insert(name, SeriesHandle(registry.series.len()));
            registry.series.push(RegisteredSeries {
                name,
                style: style_for(name),
                revision: 0,
                data,
            });
        }
        registry
    }

    pub fn handle(&self, name: SeriesName) -> Option<SeriesHandle> {
        self.handles.get(&name).copied()
    }

    pub fn get(&self, handle: SeriesHandle) -> Option<&RegisteredSeries> {
        self.series.get(handle.0)
    }

    fn replace(&mut self, name: SeriesName, data: SeriesData) {
        let Some(handle) = self.handle(name) else {
            tracing::warn!(series = %name, "No handle registered, dropping update");
            return;
        };
        if let Some(entry) = self.series.get_mut(handle.0) {
            entry.data = data;
            entry.revision += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredSeries> {
        self.series.iter()
    }

    fn clear(&mut self) {
        self.handles.clear();
        self.series.clear();
    }
}

/// In-process chart surface: keeps the latest data per series and can dump
/// it as JSON for an external renderer.
#[derive(Debug)]
pub struct ChartSurface {
    registry: SeriesRegistry,
}

impl ChartSurface {
    pub fn mount(settings: &EngineSettings) -> Self {
        let registry = SeriesRegistry::mount(|name| settings.style_for(name));
        tracing::debug!(series = registry.series.len(), "Chart surface mounted");
        Self { registry }
    }

    pub fn series(&self, name: SeriesName) -> Option<&RegisteredSeries> {
        self.registry.handle(name).and_then(|h| self.registry.get(h))
    }

    pub fn candles(&self) -> Option<&CandleSeries> {
        match &self.series(SeriesName::Candles)?.data {
            SeriesData::Candles(candles) => Some(candles),
            SeriesData::Line(_) => None,
        }
    }

    pub fn points(&self, name: SeriesName) -> Option<&[IndicatorPoint]> {
        match &self.series(name)?.data {
            SeriesData::Line(points) => Some(points),
            SeriesData::Candles(_) => None,
        }
    }

    pub fn registry(&self) -> &SeriesRegistry {
        &self.registry
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        let by_name: BTreeMap<&str, &RegisteredSeries> =
            self.registry.iter().map(|s| (s.name.as_str(), s)).collect();
        Ok(serde_json::to_string_pretty(&by_name)?)
    }

    /// Tears down every series handle.
    pub fn dispose(mut self) {
        self.registry.clear();
        tracing::debug!("Chart surface disposed");
    }
}

impl RenderSurface for ChartSurface {
    fn set_candles(&mut self, candles: &CandleSeries) {
        self.registry.replace(SeriesName::Candles, SeriesData::Candles(candles.clone()));
    }

    fn set_data(&mut self, name: SeriesName, points: &[IndicatorPoint]) {
        self.registry.replace(name, SeriesData::Line(points.to_vec()));
    }
}
