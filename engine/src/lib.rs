// Engine library root: candle fetching, indicator computation and publishing

pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod render;
pub mod services;

pub use error::EngineError;
