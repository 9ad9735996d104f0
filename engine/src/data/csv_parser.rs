// Offline kline source reading Binance kline dump CSV files
use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord};
use shared::models::Candle;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::source::{KlineRequest, MarketDataSource};
use crate::error::EngineError;

// Dumps from 2025 on carry microsecond open times; older ones milliseconds.
const MICROSECOND_THRESHOLD: i64 = 1_000_000_000_000_000;

/// Reads `{dir}/{SYMBOL}-{timeframe}.csv`, e.g. `BTCUSDT-1h.csv`.
#[derive(Debug, Clone)]
pub struct CsvKlineSource {
    dir: PathBuf,
}

impl CsvKlineSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, request: &KlineRequest) -> PathBuf {
        self.dir
            .join(format!("{}-{}.csv", request.symbol.to_uppercase(), request.timeframe.code()))
    }
}

#[async_trait]
impl MarketDataSource for CsvKlineSource {
    async fn fetch_candles(&self, request: &KlineRequest) -> Result<Vec<Candle>, EngineError> {
        let path = self.path_for(request);
        let limit = request.limit;
        tracing::debug!(path = %path.display(), limit, "Loading klines from CSV");

        tokio::task::spawn_blocking(move || load_klines_from_csv(&path, limit))
            .await
            .map_err(|e| EngineError::IoError { source: std::io::Error::other(e) })?
    }
}

/// Loads the newest `limit` rows of a kline dump.
///
/// Rows: `open_time,open,high,low,close[,volume,close_time,...]`. An optional
/// header row starting with `open_time` is skipped.
pub fn load_klines_from_csv(path: &Path, limit: usize) -> Result<Vec<Candle>, EngineError> {
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut candles = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        if idx == 0 && is_header(&record) {
            continue;
        }
        let candle = parse_record(&record).map_err(|e| {
            EngineError::MalformedKline(format!("{} line {}: {}", path.display(), idx + 1, e))
        })?;
        candles.push(candle);
    }

    if candles.len() > limit {
        candles.drain(..candles.len() - limit);
    }
    Ok(candles)
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|field| field.trim().eq_ignore_ascii_case("open_time"))
}

fn field<'a>(record: &'a StringRecord, pos: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(pos)
        .map(str::trim)
        .ok_or_else(|| format!("missing '{}' field", name))
}

fn price(record: &StringRecord, pos: usize, name: &str) -> Result<f64, String> {
    let raw = field(record, pos, name)?;
    raw.parse::<f64>()
        .map_err(|e| format!("error parsing '{}' value '{}': {}", name, raw, e))
}

fn parse_record(record: &StringRecord) -> Result<Candle, String> {
    let raw_time = field(record, 0, "open_time")?;
    let open_time = raw_time
        .parse::<i64>()
        .map_err(|e| format!("error parsing 'open_time' value '{}': {}", raw_time, e))?;
    let time = if open_time >= MICROSECOND_THRESHOLD {
        open_time.div_euclid(1_000_000)
    } else {
        open_time.div_euclid(1_000)
    };

    Ok(Candle::new(
        time,
        price(record, 1, "open")?,
        price(record, 2, "high")?,
        price(record, 3, "low")?,
        price(record, 4, "close")?,
    ))
}
