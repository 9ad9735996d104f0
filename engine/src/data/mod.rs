// Market data: where candles come from and where the current series lives
pub mod binance;
pub mod candle_store;
pub mod csv_parser;
pub mod kline;
pub mod source;

pub use binance::BinanceKlineSource;
pub use candle_store::{CandleSnapshot, CandleStore};
pub use csv_parser::CsvKlineSource;
pub use source::{KlineRequest, MarketDataSource};
