// Engine main entry point
use anyhow::Context;
use clap::Parser;
use engine::config::EngineSettings;
use engine::data::{BinanceKlineSource, CsvKlineSource, MarketDataSource};
use engine::render::{ChartSurface, SeriesData};
use engine::services::{FetchOutcome, IndicatorOrchestrator, PipelineService};
use shared::models::TimeFrame;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fetches candles and publishes SMA, EMA and pivot overlays for them.
#[derive(Parser, Debug)]
#[command(name = "candle-overlay", version, about)]
struct Cli {
    /// Settings JSON; the bundled default is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured symbol
    #[arg(long)]
    symbol: Option<String>,

    /// Timeframe to select (1m, 3m, 5m, 15m, 30m, 1h, 4h, 1d); repeat to
    /// switch timeframes in order
    #[arg(long = "timeframe")]
    timeframes: Vec<TimeFrame>,

    /// Read `{SYMBOL}-{timeframe}.csv` kline dumps from this directory
    /// instead of calling the exchange
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Write the final chart state as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => EngineSettings::load_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => EngineSettings::load_default().context("loading bundled settings")?,
    };
    if let Some(symbol) = &cli.symbol {
        settings.symbol = symbol.clone();
        settings.validate()?;
    }
    info!(symbol = %settings.symbol, "Starting candle overlay engine");

    let source: Arc<dyn MarketDataSource> = match &cli.csv_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Using CSV kline source");
            Arc::new(CsvKlineSource::new(dir))
        }
        None => {
            info!(base_url = %settings.api_base_url, "Using exchange kline source");
            Arc::new(BinanceKlineSource::from_settings(&settings)?)
        }
    };

    let timeframes = if cli.timeframes.is_empty() {
        vec![settings.default_timeframe]
    } else {
        cli.timeframes.clone()
    };

    let surface = ChartSurface::mount(&settings);
    let orchestrator = IndicatorOrchestrator::new(settings, surface)?;
    let mut pipeline = PipelineService::new(orchestrator, source);

    for timeframe in timeframes {
        pipeline.select_timeframe(timeframe);
        for outcome in pipeline.drain().await {
            match outcome {
                FetchOutcome::Published { timeframe, candles, series, failed } => {
                    info!(
                        %timeframe,
                        candles,
                        series = series.len(),
                        failed = failed.len(),
                        "Chart updated"
                    );
                }
                FetchOutcome::Failed { timeframe, reason } => {
                    tracing::warn!(%timeframe, %reason, "Chart left unchanged");
                }
                FetchOutcome::Discarded { generation, current } => {
                    tracing::debug!(generation, current, "Stale result dropped");
                }
            }
        }
    }

    let surface = pipeline.into_orchestrator().into_surface();
    match &cli.output {
        Some(path) => {
            std::fs::write(path, surface.to_json()?)
                .with_context(|| format!("writing chart state to {}", path.display()))?;
            info!(path = %path.display(), "Chart state written");
        }
        None => {
            for series in surface.registry().iter() {
                let name = series.name.as_str();
                let (points, last) = match &series.data {
                    SeriesData::Candles(c) => (c.len(), c.last().map(|c| c.close)),
                    SeriesData::Line(p) => (p.len(), p.last().map(|p| p.value)),
                };
                match last {
                    Some(value) => println!("{:<8} {:>5} points  last {:.4}", name, points, value),
                    None => println!("{:<8} {:>5} points", name, points),
                }
            }
        }
    }
    surface.dispose();

    Ok(())
}
